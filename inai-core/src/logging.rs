//! Tracing subscriber setup for the host binaries.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{InaiError, InaiResult};

/// `RUST_LOG` wins; otherwise the configured level applies. Logs go to stderr
/// so command output on stdout stays clean.
pub fn init_logging(config: &LoggingConfig) -> InaiResult<()> {
    let filter = build_env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| InaiError::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_env_filter(config: &LoggingConfig) -> InaiResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.to_ascii_lowercase())
        .map_err(|e| InaiError::Config(format!("Invalid log level '{}': {}", config.level, e)))
}
