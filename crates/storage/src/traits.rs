use chrono::{DateTime, Utc};
use promptvault_core::{NodeSummary, Version, VersionId};

use crate::error::StorageError;

/// Filter and window for the node summary projection.
#[derive(Debug, Clone, Default)]
pub struct SummaryFilter<'a> {
    /// Case-insensitive substring of the node name.
    pub name_contains: Option<&'a str>,
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Persistence for version records.
///
/// Implementations store records verbatim and never apply policy: the
/// production and deletion rules live in the engine, which wraps multi-step
/// changes in a transaction.
pub trait Storage {
    fn insert_version(&mut self, version: &Version) -> Result<(), StorageError>;

    fn get_version(&self, id: VersionId) -> Result<Option<Version>, StorageError>;

    fn get_version_at(&self, node_name: &str, ordinal: u32)
    -> Result<Option<Version>, StorageError>;

    /// Most recent first: `created_at` descending, then `ordinal` descending.
    fn get_versions(&self, node_name: &str) -> Result<Vec<Version>, StorageError>;

    fn get_production(&self, node_name: &str) -> Result<Option<Version>, StorageError>;

    fn count_versions(&self, node_name: &str) -> Result<u64, StorageError>;

    fn max_ordinal(&self, node_name: &str) -> Result<Option<u32>, StorageError>;

    /// Set the production flag and touch `updated_at`. Fails with `NotFound`
    /// if no row matched.
    fn set_production(
        &mut self,
        id: VersionId,
        production: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Fails with `NotFound` if no row matched.
    fn delete_version(&mut self, id: VersionId) -> Result<(), StorageError>;

    /// Returns the number of removed rows.
    fn delete_node(&mut self, node_name: &str) -> Result<u64, StorageError>;

    /// Latest activity first, then by name.
    fn node_summaries(&self, filter: &SummaryFilter<'_>) -> Result<Vec<NodeSummary>, StorageError>;

    fn count_nodes(&self, name_contains: Option<&str>) -> Result<u64, StorageError>;

    fn node_summary(&self, node_name: &str) -> Result<Option<NodeSummary>, StorageError>;

    /// Nodes whose number of production rows is not exactly one, with that number.
    fn production_anomalies(&self) -> Result<Vec<(String, u64)>, StorageError>;
}
