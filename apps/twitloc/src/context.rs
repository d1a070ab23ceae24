//! # Context Service
//!
//! The single source of truth for UI-facing backend state.
//!
//! A [`Context`] owns the last-known [`ContextState`], issues every backend
//! call through [`LocalizerClient`], and publishes a [`ContextEvent`] after
//! each successful state write. Observers subscribe to the event channel and
//! then pull fresh data through the accessors.
//!
//! ## Polling
//!
//! ```text
//! start() ──► GET /metamodels
//!             │
//!             ├─ tick ──► GET /metamodels ─┐
//!             │       └─► GET /localizations ─┐   (spawned, never awaited by the tick)
//!             ├─ tick ──► ...                 │
//!             ▼                               ▼
//!         Poller::stop()            write lock: replace resource, publish event
//! ```
//!
//! Ticks are not serialized against each other: several requests for the
//! same resource can be in flight, and whichever response arrives last
//! wins. There is no sequencing of responses.
//!
//! ## Concurrency
//!
//! State lives behind an `RwLock`: one writer at a time, readers always see
//! a whole snapshot. Locks are never held across an `.await`.

use crate::config::ContextConfig;
use crate::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use twitloc_core::{
    ContextEvent, ContextState, LocalizationBuckets, MetamodelState, MetamodelStatus, Statistics,
};
use twitloc_sdk::{Error as SdkError, LocalizerClient};

// =============================================================================
// CONTEXT
// =============================================================================

/// Polled state holder and API client.
///
/// Clones share the same state, client and event channel.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    client: LocalizerClient,
    state: RwLock<ContextState>,
    events: broadcast::Sender<ContextEvent>,
    /// Set while a statistics load is in flight.
    statistics_loading: AtomicBool,
    runtime: Handle,
    poll_interval: Duration,
}

impl Context {
    /// Create a context. Nothing is fetched until [`start`](Self::start)
    /// or an explicit refresh.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoRuntime`] outside a tokio runtime, and
    /// [`AppError::InvalidArgument`] for an unusable configuration.
    pub fn new(config: ContextConfig) -> Result<Self, AppError> {
        config.validate()?;
        let runtime = Handle::try_current()?;
        let client = match config.request_timeout {
            Some(timeout) => LocalizerClient::with_timeout(&config.api_server, timeout)?,
            None => LocalizerClient::new(&config.api_server),
        };
        let (events, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                state: RwLock::new(ContextState::new()),
                events,
                statistics_loading: AtomicBool::new(false),
                runtime,
                poll_interval: config.poll_interval,
            }),
        })
    }

    /// Base URL of the backend.
    pub fn api_server(&self) -> &str {
        self.inner.client.base_url()
    }

    /// Fetch metamodel status now, then keep polling metamodels and
    /// localizations every `poll_interval` until the returned [`Poller`] is
    /// stopped or dropped.
    pub fn start(&self) -> Poller {
        let inner = Arc::clone(&self.inner);
        info!(
            api_server = %self.api_server(),
            interval_ms = self.inner.poll_interval.as_millis() as u64,
            "starting poller"
        );
        Poller {
            task: Some(self.inner.runtime.spawn(poll_loop(inner))),
        }
    }

    /// Register an observer. Dropping the receiver unregisters it.
    ///
    /// A receiver only sees events published after it subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // BACKEND CALLS
    // =========================================================================

    /// `GET /metamodels`, replace the listing, publish
    /// [`ContextEvent::MetamodelsUpdated`]. On failure nothing changes.
    pub async fn refresh_metamodel_status(&self) -> Result<(), SdkError> {
        self.inner.refresh_metamodel_status().await
    }

    /// `GET /localizations`, replace all buckets, publish
    /// [`ContextEvent::LocalizationsUpdated`]. On failure nothing changes.
    pub async fn refresh_localizations(&self) -> Result<(), SdkError> {
        self.inner.refresh_localizations().await
    }

    /// `GET /pendinglocalizations`. Returned to the caller only; the
    /// polled buckets are left alone.
    pub async fn pending_localizations(&self) -> Result<LocalizationBuckets, SdkError> {
        self.inner.client.pending_localizations().await
    }

    /// Ask the backend to build a metamodel.
    ///
    /// Local state is untouched; the next poll reports the build status.
    /// A failure is logged once and returned.
    pub async fn build_metamodel(&self, metamodel: &str) -> Result<(), SdkError> {
        self.inner
            .client
            .build_metamodel(metamodel)
            .await
            .inspect_err(|err| error!(%metamodel, error = %err, "Unable to build metamodel"))
    }

    /// Ask the backend to localize a Twitter user with a metamodel.
    ///
    /// Local state is untouched; the next poll reports the job.
    /// A failure is logged once and returned.
    pub async fn localize_user(&self, screen_name: &str, metamodel: &str) -> Result<(), SdkError> {
        self.inner
            .client
            .localize(screen_name, metamodel)
            .await
            .inspect_err(|err| {
                error!(%screen_name, %metamodel, error = %err, "Unable to localize user");
            })
    }

    /// Cached statistics.
    ///
    /// Returns `None` until the first load succeeded. A `None` result starts
    /// a background load unless one is already running; subscribe and wait
    /// for [`ContextEvent::StatisticsLoaded`] to observe the value. Once
    /// cached, statistics are never requested again.
    pub fn statistics(&self) -> Option<Statistics> {
        let cached = self.inner.read().statistics().cloned();
        if cached.is_none() {
            drop(self.spawn_statistics_load());
        }
        cached
    }

    /// Spawn a statistics load unless one is already in flight.
    fn spawn_statistics_load(&self) -> Option<JoinHandle<()>> {
        if self.inner.statistics_loading.swap(true, Ordering::AcqRel) {
            return None;
        }
        let loading = LoadingFlag(Arc::clone(&self.inner));
        Some(
            self.inner
                .runtime
                .spawn(async move { loading.0.load_statistics().await }),
        )
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Names of all known metamodels, in server order.
    pub fn all_metamodels(&self) -> Vec<String> {
        self.inner.read().all_metamodels()
    }

    /// Status records of all known metamodels, in server order.
    pub fn list_metamodels(&self) -> Vec<MetamodelState> {
        self.inner.read().list_metamodels()
    }

    /// Names of the metamodels currently `online`.
    pub fn available_metamodels(&self) -> Vec<String> {
        self.inner.read().available_metamodels()
    }

    /// The whole name -> status mapping.
    pub fn metamodel_status(&self) -> MetamodelStatus {
        self.inner.read().metamodel_status().clone()
    }

    /// Last-known localization buckets.
    pub fn localizations(&self) -> LocalizationBuckets {
        self.inner.read().localizations().clone()
    }

    /// Copy of the whole state, taken under one read lock.
    pub fn snapshot(&self) -> ContextState {
        self.inner.read().clone()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("api_server", &self.api_server())
            .field("poll_interval", &self.inner.poll_interval)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn read(&self) -> RwLockReadGuard<'_, ContextState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ContextState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ContextEvent) {
        // Err only means nobody is subscribed.
        let _ = self.events.send(event);
    }

    async fn refresh_metamodel_status(&self) -> Result<(), SdkError> {
        let status = self.client.metamodels().await?;
        self.write().replace_metamodel_status(status);
        self.publish(ContextEvent::MetamodelsUpdated);
        Ok(())
    }

    async fn refresh_localizations(&self) -> Result<(), SdkError> {
        let buckets = self.client.localizations().await?;
        self.write().replace_localizations(buckets);
        self.publish(ContextEvent::LocalizationsUpdated);
        Ok(())
    }

    async fn load_statistics(&self) {
        // A load that finished between the caller's check and our spawn
        // already filled the cache.
        let cached = self.read().statistics().is_some();
        if !cached {
            match self.client.statistics().await {
                Ok(statistics) => {
                    self.write().cache_statistics(statistics);
                    self.publish(ContextEvent::StatisticsLoaded);
                }
                Err(err) => warn!(error = %err, "Unable to load statistics"),
            }
        }
    }
}

/// Owned by a statistics load task. Dropping it clears the in-flight flag,
/// whether the load finished or the task was cancelled.
struct LoadingFlag(Arc<Inner>);

impl Drop for LoadingFlag {
    fn drop(&mut self) {
        self.0.statistics_loading.store(false, Ordering::Release);
    }
}

// =============================================================================
// POLLER
// =============================================================================

/// Handle of a running poll loop.
///
/// Stopping or dropping it cancels the timer and every fetch the loop still
/// has in flight.
#[derive(Debug)]
pub struct Poller {
    task: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the poll loop and wait until it is gone.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            info!("poller stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Resource {
    Metamodels,
    Localizations,
}

impl Resource {
    fn name(self) -> &'static str {
        match self {
            Self::Metamodels => "metamodels",
            Self::Localizations => "localizations",
        }
    }
}

async fn poll_loop(inner: Arc<Inner>) {
    // Owned by the loop: aborting the loop drops the set, which aborts
    // every fetch still in flight.
    let mut in_flight = JoinSet::new();
    spawn_refresh(&mut in_flight, &inner, Resource::Metamodels);

    let period = inner.poll_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        while in_flight.try_join_next().is_some() {}
        spawn_refresh(&mut in_flight, &inner, Resource::Metamodels);
        spawn_refresh(&mut in_flight, &inner, Resource::Localizations);
    }
}

fn spawn_refresh(in_flight: &mut JoinSet<()>, inner: &Arc<Inner>, resource: Resource) {
    let inner = Arc::clone(inner);
    in_flight.spawn(async move {
        let result = match resource {
            Resource::Metamodels => inner.refresh_metamodel_status().await,
            Resource::Localizations => inner.refresh_localizations().await,
        };
        if let Err(err) = result {
            debug!(resource = resource.name(), error = %err, "poll failed, keeping last state");
        }
    });
}
