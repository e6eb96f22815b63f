use async_trait::async_trait;

use imolink_common::types::{
    CycleStats, DiscoveredLink, LinkKey, LocalityRef, NewLink, NewLogEntry, OperationType,
    Platform, UpsertOutcome,
};
use imolink_common::ImolinkError;

/// Read access to the externally managed reference tables. Discovery
/// never writes these.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn active_localities(&self) -> Result<Vec<LocalityRef>, ImolinkError>;

    async fn active_platforms(&self) -> Result<Vec<Platform>, ImolinkError>;

    async fn operation_types(&self) -> Result<Vec<OperationType>, ImolinkError>;
}

/// Writes to the discovery tables.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn find_link(&self, key: &LinkKey) -> Result<Option<DiscoveredLink>, ImolinkError>;

    /// Insert or refresh the single row identified by `key`. Running
    /// the same write twice leaves one row either way.
    async fn upsert_link(
        &self,
        key: &LinkKey,
        link: &NewLink,
    ) -> Result<UpsertOutcome, ImolinkError>;

    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), ImolinkError>;

    async fn record_cycle(&self, stats: &CycleStats) -> Result<(), ImolinkError>;
}
