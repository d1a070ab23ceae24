//! Application error type.

use thiserror::Error;

/// Errors surfaced by the context service and the CLI.
#[derive(Debug, Error)]
pub enum AppError {
    /// A backend call failed.
    #[error(transparent)]
    Sdk(#[from] twitloc_sdk::Error),

    /// The context was created outside a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// A lazily loaded resource did not arrive in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}
