//! # Twitloc Library
//!
//! This library exposes the twitloc modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;

pub use config::ContextConfig;
pub use context::{Context, Poller};
pub use error::AppError;

// Re-export the lower layers for convenience
pub use twitloc_core;
pub use twitloc_sdk;
