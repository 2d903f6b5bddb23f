//! # Structured Logging Module
//!
//! Environment-aware tracing initialization for the data-access layer.
//! Console output honors `RUST_LOG` when set; otherwise the level follows
//! the detected environment. Production output can be switched to JSON with
//! `DATAHUB_LOG_FORMAT=json`.

use std::sync::OnceLock;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process. Subsequent calls are
/// no-ops, and an already-installed global subscriber (e.g. from the
/// embedding application) is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let json_output = std::env::var("DATAHUB_LOG_FORMAT")
            .map(|v| v.to_lowercase() == "json")
            .unwrap_or(false);

        let init_result = if json_output {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).json().with_filter(filter))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_filter(filter))
                .try_init()
        };

        if init_result.is_err() {
            tracing::debug!(
                "global tracing subscriber already initialized - continuing with existing subscriber"
            );
        } else {
            tracing::info!(environment = %environment, "structured logging initialized");
        }
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("DATAHUB_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
