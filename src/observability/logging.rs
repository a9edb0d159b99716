//! Structured logging setup.

use crate::config::{LogFormat, LoggingSettings};
use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a filter directive.
const LOG_ENV: &str = "SHEETBRIDGE_LOG";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter applied to all layers.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds logging configuration from settings.
    ///
    /// Precedence: `SHEETBRIDGE_LOG`, then `RUST_LOG`, then `--verbose`
    /// (debug), then the configured level.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = std::env::var(LOG_ENV)
            .ok()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                if verbose {
                    "debug".to_string()
                } else {
                    settings.level.clone()
                }
            });

        Self {
            format: settings.format,
            filter: EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

/// Installs the global tracing subscriber. Logs go to stderr.
///
/// # Errors
///
/// Returns an error if logging has already been initialized.
pub fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::operation(
            "logging_init",
            "logging already initialized",
        ));
    }

    let config = LoggingConfig::from_settings(settings, verbose);

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_target(true),
            )
            .with(config.filter)
            .try_init()
            .map_err(init_error)?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(config.filter)
            .try_init()
            .map_err(init_error)?,
    }

    LOGGING_INIT
        .set(())
        .map_err(|()| Error::operation("logging_init", "failed to mark logging initialized"))
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::operation("logging_init", e)
}
