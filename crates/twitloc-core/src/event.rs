//! # Context Events
//!
//! Change notifications published after a resource was replaced.
//!
//! Events carry no payload. Observers react by reading the fresh state
//! through the context accessors.

use std::fmt;

/// A resource in the context state was updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextEvent {
    /// The metamodel listing was replaced.
    MetamodelsUpdated,
    /// The localization buckets were replaced.
    LocalizationsUpdated,
    /// The statistics record was loaded and cached.
    StatisticsLoaded,
}

impl ContextEvent {
    /// Wire name of the event, as UI observers know it.
    pub fn name(self) -> &'static str {
        match self {
            Self::MetamodelsUpdated => "metamodelsUpdated",
            Self::LocalizationsUpdated => "localizationsUpdated",
            Self::StatisticsLoaded => "statisticsLoaded",
        }
    }
}

impl fmt::Display for ContextEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
