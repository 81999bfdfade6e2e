//! Thread-safe front over the engine pool.
//!
//! Mutations on one node are serialized by a per-node critical section; the
//! SQLite transaction inside each engine call makes them commit-or-reject.
//! A pooled connection is never held while waiting for a node.

use parking_lot::Mutex;
use promptvault_core::{
    ContentDraft, NodeSummary, Page, PageRequest, RoleOrderPolicy, Version, VersionId,
    version::normalize_node_name,
};

use crate::config::VaultConfig;
use crate::error::{ConflictReason, EngineError};
use crate::locks::NodeLocks;
use crate::pool::{self, PooledEngine, StorePool};

pub struct PromptVault {
    pool: StorePool,
    locks: NodeLocks,
    role_order: Mutex<RoleOrderPolicy>,
    page_size: u32,
}

impl PromptVault {
    pub fn open(config: &VaultConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let pool = pool::open_pool(&config.location(), config.pool_size(), config.acquire_timeout())?;
        tracing::info!(
            location = ?config.location(),
            connections = config.pool_size(),
            role_order = %config.versions.role_order,
            "vault opened"
        );
        Ok(Self {
            pool,
            locks: NodeLocks::new(config.acquire_timeout()),
            role_order: Mutex::new(config.versions.role_order),
            page_size: config.registry.page_size,
        })
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        Self::open(&VaultConfig::in_memory())
    }

    /// Page request for `page` at the configured page size.
    pub fn page(&self, page: u32) -> Result<PageRequest, EngineError> {
        Ok(PageRequest::new(page, self.page_size)?)
    }

    fn engine(&self) -> Result<PooledEngine, EngineError> {
        pool::checkout(&self.pool)
    }

    // ========================================================================
    // Role Order Policy
    // ========================================================================

    pub fn role_order(&self) -> RoleOrderPolicy {
        *self.role_order.lock()
    }

    pub fn set_role_order(&self, policy: RoleOrderPolicy) {
        *self.role_order.lock() = policy;
    }

    /// Flip the policy for subsequent creates and return the new value.
    pub fn toggle_role_order(&self) -> RoleOrderPolicy {
        let mut slot = self.role_order.lock();
        slot.toggle();
        tracing::debug!(role_order = %*slot, "role order toggled");
        *slot
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create under the current role order.
    pub fn create_version(
        &self,
        node_name: &str,
        draft: &ContentDraft,
        message: Option<&str>,
    ) -> Result<Version, EngineError> {
        let policy = self.role_order();
        self.create_version_with(node_name, draft, message, policy)
    }

    pub fn create_version_with(
        &self,
        node_name: &str,
        draft: &ContentDraft,
        message: Option<&str>,
        policy: RoleOrderPolicy,
    ) -> Result<Version, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        let _node = self.locks.acquire(&node_name)?;
        self.engine()?
            .create_version(&node_name, draft, message, policy)
    }

    /// Promote `id`. If the version vanishes before the node's critical
    /// section is entered the call fails with "version was removed".
    pub fn promote(&self, id: VersionId) -> Result<Version, EngineError> {
        let node_name = self.get_version(id)?.node_name;
        let _node = self.locks.acquire(&node_name)?;
        self.engine()?.promote(id).map_err(|e| match e {
            EngineError::NotFound(_) => EngineError::Conflict(ConflictReason::VersionRemoved),
            other => other,
        })
    }

    pub fn delete_version(&self, id: VersionId) -> Result<Version, EngineError> {
        let node_name = self.get_version(id)?.node_name;
        let _node = self.locks.acquire(&node_name)?;
        self.engine()?.delete_version(id)
    }

    pub fn delete_version_at(&self, node_name: &str, ordinal: u32) -> Result<Version, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        let _node = self.locks.acquire(&node_name)?;
        self.engine()?.delete_version_at(&node_name, ordinal)
    }

    pub fn delete_node(&self, node_name: &str) -> Result<u64, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        let _node = self.locks.acquire(&node_name)?;
        self.engine()?.delete_node(&node_name)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get_version(&self, id: VersionId) -> Result<Version, EngineError> {
        self.engine()?.get_version(id)
    }

    pub fn get_version_at(&self, node_name: &str, ordinal: u32) -> Result<Version, EngineError> {
        self.engine()?.get_version_at(node_name, ordinal)
    }

    pub fn get_versions(&self, node_name: &str) -> Result<Vec<Version>, EngineError> {
        self.engine()?.get_versions(node_name)
    }

    pub fn count_versions(&self, node_name: &str) -> Result<u64, EngineError> {
        self.engine()?.count_versions(node_name)
    }

    pub fn get_production(&self, node_name: &str) -> Result<Option<Version>, EngineError> {
        self.engine()?.get_production(node_name)
    }

    pub fn list_summaries(
        &self,
        request: PageRequest,
        name_contains: Option<&str>,
    ) -> Result<Page<NodeSummary>, EngineError> {
        self.engine()?.list_summaries(request, name_contains)
    }

    pub fn get_summary(&self, node_name: &str) -> Result<NodeSummary, EngineError> {
        self.engine()?.get_summary(node_name)
    }

    /// Nodes whose production count is not exactly one. Empty when healthy.
    pub fn production_anomalies(&self) -> Result<Vec<(String, u64)>, EngineError> {
        use promptvault_storage::Storage;
        Ok(self.engine()?.storage().production_anomalies()?)
    }
}
