//! Prometheus metrics for the retention job.
//!
//! Provides counters for:
//! - Images deleted per account, by status
//! - Deletion candidates allocated per account
//! - Errors per pipeline stage
//! - Completed runs, by outcome
//!
//! Without the `prometheus` feature every recording function is a no-op.

#[cfg(feature = "prometheus")]
use metrics::counter;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Initialize the metrics system with the given configuration.
///
/// Counters are only exported through a scrape listener, so nothing is
/// installed unless `prometheus_listen` is set. Must be called from within a
/// Tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    let Some(addr) = config.prometheus_listen.filter(|_| config.enabled) else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(MetricsError::Install)?;
    tracing::info!(address = %addr, "Prometheus metrics listener started");

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.prometheus_listen.is_some() {
        tracing::warn!(
            "A Prometheus listener is configured but the 'prometheus' feature is not compiled"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record image deletions for an account.
///
/// `status` is one of `success`, `failure` or `dry_run`.
pub fn record_deletions(account: &str, status: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "image_retention_deletions_total",
            "account" => account.to_string(),
            "status" => status.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (account, status, count);
    }
}

/// Record the number of deletion candidates allocated for an account.
pub fn record_candidates(account: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "image_retention_candidates_total",
            "account" => account.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (account, count);
    }
}

/// Record a pipeline error.
///
/// `stage` is one of `discovery`, `session`, `folder_listing`,
/// `image_listing`, `delete` or `task`.
pub fn record_error(stage: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "image_retention_errors_total",
            "stage" => stage.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = stage;
    }
}

/// Record a completed run.
///
/// `outcome` is one of `success`, `partial` or `failed`.
pub fn record_run(outcome: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "image_retention_runs_total",
            "outcome" => outcome.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = outcome;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed in unit tests; recording must still be safe.
    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_deletions("base", "success", 3);
        record_candidates("base", 3);
        record_error("image_listing");
        record_run("success");
    }

    #[test]
    fn test_disabled_metrics_skip_install() {
        let config = MetricsConfig {
            enabled: false,
            prometheus_listen: None,
        };
        assert!(init_metrics(&config).is_ok());
    }
}
