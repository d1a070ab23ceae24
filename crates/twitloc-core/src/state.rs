//! # Context State
//!
//! The client-side snapshot of the three resources the backend exposes.
//!
//! Each resource is replaced wholesale: a fresh metamodel listing drops
//! metamodels the server no longer reports, and fresh buckets replace all
//! three job lists at once. Statistics are cached once and never expire.

use crate::types::{LocalizationBuckets, MetamodelState, MetamodelStatus, Statistics};

/// Last-known server state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextState {
    metamodel_status: MetamodelStatus,
    localizations: LocalizationBuckets,
    statistics: Option<Statistics>,
}

impl ContextState {
    /// Create an empty snapshot: no metamodels, empty buckets, no statistics.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Replace the metamodel listing with a fresh response.
    pub fn replace_metamodel_status(&mut self, status: MetamodelStatus) {
        self.metamodel_status = status;
    }

    /// Replace all three localization buckets with a fresh response.
    pub fn replace_localizations(&mut self, localizations: LocalizationBuckets) {
        self.localizations = localizations;
    }

    /// Store the statistics record.
    pub fn cache_statistics(&mut self, statistics: Statistics) {
        self.statistics = Some(statistics);
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// The full metamodel listing.
    pub fn metamodel_status(&self) -> &MetamodelStatus {
        &self.metamodel_status
    }

    /// Status record of one metamodel.
    pub fn metamodel(&self, name: &str) -> Option<&MetamodelState> {
        self.metamodel_status.get(name)
    }

    /// Names of all known metamodels, in server order.
    pub fn all_metamodels(&self) -> Vec<String> {
        self.metamodel_status.names().map(str::to_owned).collect()
    }

    /// Status records of all known metamodels, in server order.
    pub fn list_metamodels(&self) -> Vec<MetamodelState> {
        self.metamodel_status.states().cloned().collect()
    }

    /// Names of the metamodels whose status is exactly `online`.
    pub fn available_metamodels(&self) -> Vec<String> {
        self.metamodel_status
            .iter()
            .filter(|(_, state)| state.is_online())
            .map(|(name, _)| name.to_owned())
            .collect()
    }

    /// Last-known localization buckets.
    pub fn localizations(&self) -> &LocalizationBuckets {
        &self.localizations
    }

    /// Cached statistics, `None` until the first successful load.
    pub fn statistics(&self) -> Option<&Statistics> {
        self.statistics.as_ref()
    }
}

// =============================================================================
// TESTS
// =============================================================================
