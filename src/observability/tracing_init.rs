//! Tracing initialization with configurable logging formats.
//!
//! Logs go to stderr so that command output on stdout (the `accounts` listing)
//! stays machine-readable.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig, ObservabilityConfig};

/// Initialize the tracing subscriber with the given configuration.
///
/// This sets up:
/// - Console logging with configurable format (pretty, compact, JSON)
/// - Environment-based log filtering (`RUST_LOG` wins over the config)
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), TracingError> {
    let logging = &config.logging;
    let filter = build_env_filter(logging, std::env::var("RUST_LOG").ok().as_deref());
    let registry = tracing_subscriber::registry().with(filter);

    let result = match (logging.format, logging.timestamps) {
        (LogFormat::Pretty, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line),
            )
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line),
            )
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Json, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(logging.include_spans)
                    .with_span_list(logging.include_spans)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line),
            )
            .try_init(),
        (LogFormat::Json, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(logging.include_spans)
                    .with_span_list(logging.include_spans)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line)
                    .without_time(),
            )
            .try_init(),
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

/// Build the environment filter from logging config.
///
/// `rust_log` (the `RUST_LOG` value) takes precedence. Otherwise the
/// configured level is combined with the extra filter directives, or with a
/// default that quiets the HTTP stack.
fn build_env_filter(config: &LoggingConfig, rust_log: Option<&str>) -> EnvFilter {
    let base_level = config.level.as_str();

    if let Some(env_filter) = rust_log {
        EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else if let Some(filter) = &config.filter {
        let combined = format!("{},{}", base_level, filter);
        EnvFilter::try_new(combined).unwrap_or_else(|_| EnvFilter::new(base_level))
    } else {
        EnvFilter::new(default_directives(base_level))
    }
}

fn default_directives(base_level: &str) -> String {
    format!("{base_level},hyper=warn,hyper_util=warn,h2=warn,reqwest=warn,rustls=warn")
}

/// Tracing initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_rust_log_wins() {
        let config = LoggingConfig {
            level: LogLevel::Error,
            filter: Some("yc_image_cleaner=trace".into()),
            ..Default::default()
        };
        let filter = build_env_filter(&config, Some("debug"));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_config_filter_combined_with_level() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filter: Some("yc_image_cleaner=debug".into()),
            ..Default::default()
        };
        let filter = build_env_filter(&config, None).to_string();
        assert!(filter.contains("warn"));
        assert!(filter.contains("yc_image_cleaner=debug"));
    }

    #[test]
    fn test_default_quiets_http_stack() {
        let directives = default_directives("info");
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("hyper=warn"));
    }

    #[test]
    fn test_invalid_rust_log_falls_back_to_level() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            ..Default::default()
        };
        let filter = build_env_filter(&config, Some("yc_image_cleaner=loud"));
        assert_eq!(filter.to_string(), "debug");
    }
}
