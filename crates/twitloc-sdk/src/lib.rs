//! # Twitloc SDK
//!
//! Typed async client for the Twitter localization backend.
//!
//! Every endpoint of the REST API maps to one method. The client keeps no
//! state between calls: polling, caching and change notification are the
//! job of the application layer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use twitloc_sdk::LocalizerClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), twitloc_sdk::Error> {
//!     let client = LocalizerClient::new("http://127.0.0.1:5000");
//!
//!     let status = client.metamodels().await?;
//!     for (name, state) in status.iter() {
//!         println!("{name}: {}", state.status);
//!     }
//!
//!     client.localize("heidi", "SimpleSwissFriendRatio").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Endpoints
//!
//! ```text
//! GET  /metamodels            -> MetamodelStatus
//! GET  /localizations         -> LocalizationBuckets
//! GET  /pendinglocalizations  -> LocalizationBuckets
//! GET  /statistics            -> Statistics
//! POST /buildmetamodel        {"metamodel"}                -> 2xx
//! POST /localize              {"screenName", "metamodel"}  -> 2xx
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use twitloc_core::{
    BuildMetamodelRequest, LocalizationBuckets, LocalizeRequest, MetamodelStatus, Statistics,
};

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors from the localization API client.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure (connection refused, reset, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body is not the expected JSON shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status.
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl Error {
    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            Self::Json(_) => None,
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client for the localization backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct LocalizerClient {
    base_url: String,
    client: reqwest::Client,
}

impl LocalizerClient {
    /// Create a client for the given base URL.
    ///
    /// No client-side timeout is applied; requests rely on the transport.
    ///
    /// ```rust,ignore
    /// let client = LocalizerClient::new("http://127.0.0.1:5000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client that aborts every request after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client fails to build.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: normalize_base_url(base_url.into()),
            client,
        })
    }

    /// Base URL requests are issued against, without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Status of every metamodel the backend knows.
    pub async fn metamodels(&self) -> Result<MetamodelStatus, Error> {
        self.get_json("/metamodels").await
    }

    /// All localization jobs, grouped into complete / pending / failed.
    pub async fn localizations(&self) -> Result<LocalizationBuckets, Error> {
        self.get_json("/localizations").await
    }

    /// Same payload as [`localizations`](Self::localizations), served
    /// under the backend's pending-jobs route.
    pub async fn pending_localizations(&self) -> Result<LocalizationBuckets, Error> {
        self.get_json("/pendinglocalizations").await
    }

    /// Dataset counters.
    pub async fn statistics(&self) -> Result<Statistics, Error> {
        self.get_json("/statistics").await
    }

    /// Request a metamodel build.
    ///
    /// The build runs in the background on the server; poll
    /// [`metamodels`](Self::metamodels) to observe its progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Status`] when the server refuses the build
    /// (unknown metamodel, build already running).
    pub async fn build_metamodel(&self, metamodel: &str) -> Result<(), Error> {
        self.post_json("/buildmetamodel", &BuildMetamodelRequest::new(metamodel))
            .await
    }

    /// Request the localization of a Twitter user with a metamodel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Status`] when the server refuses the job (unknown
    /// or offline metamodel).
    pub async fn localize(&self, screen_name: &str, metamodel: &str) -> Result<(), Error> {
        self.post_json("/localize", &LocalizeRequest::new(screen_name, metamodel))
            .await
    }

    // =========================================================================
    // REQUEST HELPERS
    // =========================================================================

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    async fn get_json<T: DeserializeOwned>(&self, route: &str) -> Result<T, Error> {
        let url = self.url(route);
        debug!(%url, "GET");
        let resp = ensure_success(self.client.get(&url).send().await?).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn post_json<B: Serialize>(&self, route: &str, body: &B) -> Result<(), Error> {
        let url = self.url(route);
        debug!(%url, "POST");
        ensure_success(self.client.post(&url).json(body).send().await?).await?;
        Ok(())
    }
}

fn normalize_base_url(mut base_url: String) -> String {
    while base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}

/// Turn a non-2xx response into [`Error::Status`], keeping the body text.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        message,
    })
}
