//! # Configuration
//!
//! Settings of the [`Context`](crate::context::Context) service. The CLI
//! fills them from its global flags; library users build them directly.

use crate::error::AppError;
use std::time::Duration;

/// Backend the client talks to when nothing else is configured.
pub const DEFAULT_API_SERVER: &str = "http://127.0.0.1:5000";

/// Period of the metamodel / localization poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Buffered events per subscriber before a slow one starts lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Context service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Base URL of the backend, fixed for the lifetime of the context.
    pub api_server: String,

    /// Period between two poll ticks.
    pub poll_interval: Duration,

    /// Per-request timeout. `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,

    /// Capacity of the event channel.
    pub event_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_SERVER)
    }
}

impl ContextConfig {
    /// Default settings against the given backend.
    pub fn new(api_server: impl Into<String>) -> Self {
        Self {
            api_server: api_server.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Reject settings the poller or the event channel cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.api_server.trim().is_empty() {
            return Err(AppError::InvalidArgument("api server URL is empty".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(AppError::InvalidArgument("poll interval must be non-zero".into()));
        }
        if self.event_capacity == 0 {
            return Err(AppError::InvalidArgument("event capacity must be non-zero".into()));
        }
        Ok(())
    }
}
