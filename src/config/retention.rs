//! Image retention configuration.
//!
//! Controls how many images are kept per folder and how many deletions a
//! single account may issue in one run.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! keep_count = 30
//! max_deletions_per_run = 500
//! page_size = 1000
//! dry_run = false
//!
//! [schedule]
//! interval_secs = 3600
//! ```

use serde::{Deserialize, Serialize};

use super::{
    ConfigError,
    env::{EnvSource, bool_var, u64_var},
};

/// Largest page size accepted by the list endpoints.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Retention policy and per-account deletion budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Number of most recently created images to keep in every folder.
    /// Set to 0 to delete every image (subject to the budget).
    /// Default: 30
    #[serde(default = "default_keep_count")]
    pub keep_count: usize,

    /// Maximum number of delete requests issued per account per run.
    /// Must be positive.
    /// Default: 500
    #[serde(default = "default_max_deletions_per_run")]
    pub max_deletions_per_run: usize,

    /// Page size used when listing folders and images.
    /// Default: 1000 (the provider maximum)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// If true, log what would be deleted without deleting anything.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_count: default_keep_count(),
            max_deletions_per_run: default_max_deletions_per_run(),
            page_size: default_page_size(),
            dry_run: false,
        }
    }
}

fn default_keep_count() -> usize {
    30
}

fn default_max_deletions_per_run() -> usize {
    500
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

impl RetentionConfig {
    /// Apply `YC_KEEP_IMAGES_COUNT`, `YC_MAX_DELETIONS_PER_RUN`, `YC_PAGE_SIZE`
    /// and `YC_DRY_RUN` over the current values.
    pub fn apply_env(&mut self, env: &dyn EnvSource) -> Result<(), ConfigError> {
        if let Some(keep) = u64_var(env, "YC_KEEP_IMAGES_COUNT")? {
            self.keep_count = keep as usize;
        }
        if let Some(budget) = u64_var(env, "YC_MAX_DELETIONS_PER_RUN")? {
            self.max_deletions_per_run = budget as usize;
        }
        if let Some(page_size) = u64_var(env, "YC_PAGE_SIZE")? {
            self.page_size = u32::try_from(page_size).unwrap_or(u32::MAX);
        }
        if let Some(dry_run) = bool_var(env, "YC_DRY_RUN")? {
            self.dry_run = dry_run;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_deletions_per_run == 0 {
            return Err(ConfigError::Validation(
                "retention.max_deletions_per_run must be greater than 0".into(),
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Validation(format!(
                "retention.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        Ok(())
    }
}

/// Pause between runs when the binary schedules itself (`daemon` mode).
///
/// Deployments driven by an external cron ignore this section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Seconds to wait after a run finishes before the next one.
    /// Default: 3600
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

impl ScheduleConfig {
    /// Get the interval as a Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "schedule.interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
