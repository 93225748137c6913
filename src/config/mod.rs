//! Configuration module for the image cleaner.
//!
//! Settings are resolved once at startup into a [`CleanerConfig`] that is then
//! passed by reference to every component. Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file, with `${VAR_NAME}` interpolation
//! 3. Environment variables (`YC_KEEP_IMAGES_COUNT`, `YC_COMPUTE_ENDPOINT`, ...)
//!
//! Account credentials are never read from the file; they are discovered from
//! the environment by [`crate::accounts`].
//!
//! # Example
//!
//! ```toml
//! [retention]
//! keep_count = 30
//! max_deletions_per_run = 500
//!
//! [endpoints]
//! use_custom_resolver = true
//! compute = "${COMPUTE_PRIVATE_ENDPOINT}"
//!
//! [observability.logging]
//! format = "json"
//! ```

mod endpoints;
pub mod env;
mod observability;
mod providers;
mod retention;

use std::{path::Path, sync::LazyLock};

pub use endpoints::*;
use env::EnvSource;
pub use observability::*;
pub use providers::*;
use regex::Regex;
pub use retention::*;
use serde::{Deserialize, Serialize};

/// Root configuration.
///
/// All sections are optional with sensible defaults, so an empty file (or no
/// file at all) is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanerConfig {
    /// Retention policy and deletion budget.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Self-scheduling interval for `daemon` mode.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Process-wide endpoint defaults.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// HTTP client and retry settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl CleanerConfig {
    /// Resolve the full configuration: defaults, then the optional file, then
    /// environment overrides. The result is validated.
    pub fn load(path: Option<&Path>, env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path, env)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>, env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents, env)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str, env: &dyn EnvSource) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents, env)?;
        let config: CleanerConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of the current values.
    pub fn apply_env(&mut self, env: &dyn EnvSource) -> Result<(), ConfigError> {
        self.retention.apply_env(env)?;
        self.endpoints.apply_env(env)?;
        Ok(())
    }

    /// Validate the configuration for consistency and completeness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retention.validate()?;
        self.schedule.validate()?;
        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "provider.timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid value {value:?} for {name}: expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex"));

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented text (anything after a `#` on the same line).
fn expand_env_vars(input: &str, env: &dyn EnvSource) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_PATTERN.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = env
                .var(var_name)
                .ok_or_else(|| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
