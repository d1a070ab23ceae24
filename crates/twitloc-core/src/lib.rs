//! # Twitloc Core
//!
//! The data model of the Twitter localization client.
//!
//! This crate holds everything that does not touch the network:
//! - Wire types decoded from the backend REST API ([`types`])
//! - The client-side snapshot of the three polled resources ([`state`])
//! - The typed change notifications published to observers ([`event`])
//! - Display helpers for large counters ([`format`])
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  JSON   ┌──────────────────┐  replace   ┌──────────────────┐
//! │  Backend REST    │ ──────► │  twitloc-sdk     │ ─────────► │  ContextState    │
//! │  (/metamodels,   │         │  (decodes into   │            │  (this crate)    │
//! │   /localizations │         │   core types)    │            │                  │
//! │   /statistics)   │         └──────────────────┘            └────────┬─────────┘
//! └──────────────────┘                                                  │ ContextEvent
//!                                                                       ▼
//!                                                                  observers
//! ```
//!
//! Every resource is replaced wholesale by the response that arrives last.
//! Nothing here merges, sequences or expires data.

pub mod event;
pub mod format;
pub mod state;
pub mod types;

pub use event::ContextEvent;
pub use format::{format_count, format_large_number};
pub use state::ContextState;
pub use types::{
    BuildMetamodelRequest, Localization, LocalizationBuckets, LocalizeRequest, MetamodelState,
    MetamodelStatus, Statistics, STATUS_BUILDING, STATUS_ERROR, STATUS_OFFLINE, STATUS_ONLINE,
};
