//! Logging setup for the binary.
//!
//! `RUST_LOG` wins over the `--log-level` flag. Output goes to stderr so
//! command output on stdout stays clean.

use crate::error::AppError;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber. Call once, before the first log.
pub fn init(default_level: &str) -> Result<(), AppError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level).map_err(|e| {
            AppError::InvalidArgument(format!("log level '{}': {}", default_level, e))
        })?,
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
