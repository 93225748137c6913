//! Environment variable access.
//!
//! All configuration reads go through [`EnvSource`] so that account discovery
//! and setting overrides can be exercised against an in-memory map in tests
//! instead of the real process environment.

use std::collections::HashMap;

use super::ConfigError;

/// A read-only key/value view of the environment.
pub trait EnvSource: Send + Sync {
    /// Get a raw variable value. Returns `None` if the variable is not set.
    fn var(&self, key: &str) -> Option<String>;

    /// Get a variable, treating empty and whitespace-only values as unset.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Reads variables from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment, used by tests and for embedding the library.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Read a variable or fall back to `default`.
///
/// Returns [`ConfigError::EnvVarNotFound`] if the variable is unset (or empty)
/// and no default was supplied.
pub fn get_env(
    env: &dyn EnvSource,
    name: &str,
    default: Option<&str>,
) -> Result<String, ConfigError> {
    env.non_empty(name)
        .or_else(|| {
            default
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
        })
        .ok_or_else(|| ConfigError::EnvVarNotFound(name.to_string()))
}

/// Parse a boolean flag. Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            expected: "a boolean (1/0, true/false)",
        }),
    }
}

/// Parse a non-negative integer.
pub fn parse_u64(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            expected: "a non-negative integer",
        })
}

/// Read an optional boolean variable.
pub fn bool_var(env: &dyn EnvSource, name: &str) -> Result<Option<bool>, ConfigError> {
    env.non_empty(name).map(|v| parse_bool(name, &v)).transpose()
}

/// Read an optional integer variable.
pub fn u64_var(env: &dyn EnvSource, name: &str) -> Result<Option<u64>, ConfigError> {
    env.non_empty(name).map(|v| parse_u64(name, &v)).transpose()
}
