pub mod config;
pub mod error;
pub mod guard;
pub mod locks;
pub mod pool;
pub mod production;
pub mod registry;
pub mod vault;

pub use config::{ConfigError, StoreLocation, VaultConfig};
pub use error::{ConflictReason, EngineError};
pub use guard::{DeleteVerdict, can_delete};
pub use vault::PromptVault;

use std::ops::Deref;

use chrono::{DateTime, SubsecRound, Utc};

use promptvault_core::{
    ContentDraft, RoleOrderPolicy, Version, VersionId,
    version::{normalize_message, normalize_node_name},
};
use promptvault_storage::{SqliteStorage, Storage};
use rusqlite::Connection;

/// Wall-clock time at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Single-connection executor for version operations.
///
/// Every mutation runs in one `BEGIN IMMEDIATE` transaction, so its checks
/// and writes commit together or not at all. `Engine` is not shareable;
/// concurrent callers go through [`PromptVault`], which runs each call on a
/// pooled connection.
pub struct Engine<C = Box<Connection>> {
    storage: SqliteStorage<C>,
}

impl<C: Deref<Target = Connection>> Engine<C> {
    pub fn new(storage: SqliteStorage<C>) -> Self {
        Self { storage }
    }

    /// Read-only view; writes go through the guarded operations below.
    pub fn storage(&self) -> &SqliteStorage<C> {
        &self.storage
    }

    /// Execute a batch SQL statement on the underlying connection, mapping errors.
    fn exec_batch(&self, sql: &str) -> Result<(), EngineError> {
        self.storage
            .conn()
            .execute_batch(sql)
            .map_err(|e| EngineError::from(promptvault_storage::StorageError::Sqlite(e)))
    }

    /// Run `f` inside a write transaction; any error rolls everything back.
    pub(crate) fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.exec_batch("BEGIN IMMEDIATE")?;

        let result = f(self).and_then(|value| self.exec_batch("COMMIT").map(|_| value));

        if result.is_err() {
            let _ = self.exec_batch("ROLLBACK");
        }
        result
    }

    // ========================================================================
    // Version Store
    // ========================================================================

    /// Append a new version to `node_name`.
    ///
    /// Role orders are frozen from `policy`. The first version of a node is
    /// created as its production version.
    pub fn create_version(
        &mut self,
        node_name: &str,
        draft: &ContentDraft,
        message: Option<&str>,
        policy: RoleOrderPolicy,
    ) -> Result<Version, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        let message = normalize_message(message)?;
        let content = draft.build(policy)?;

        let version = self.transaction(|engine| {
            let ordinal = match engine.storage.max_ordinal(&node_name)? {
                Some(max) => max.checked_add(1).ok_or_else(|| {
                    EngineError::Validation(format!("node '{node_name}' has run out of ordinals"))
                })?,
                None => 1,
            };
            let summary = engine.storage.node_summary(&node_name)?;

            // Keep created_at monotonic within a node even if the wall clock steps back.
            let now = now();
            let created_at = summary
                .as_ref()
                .map_or(now, |s| s.latest_created_at.max(now));

            let version = Version {
                id: VersionId::new(),
                node_name: node_name.clone(),
                ordinal,
                content,
                message,
                production: summary.is_none(),
                created_at,
                updated_at: created_at,
            };
            engine.storage.insert_version(&version)?;
            Ok(version)
        })?;

        tracing::info!(
            node = %version.node_name,
            version_id = %version.id,
            ordinal = version.ordinal,
            production = version.production,
            role_order = %policy,
            "version created"
        );
        Ok(version)
    }

    pub fn get_version(&self, id: VersionId) -> Result<Version, EngineError> {
        self.storage
            .get_version(id)?
            .ok_or_else(|| EngineError::NotFound(format!("version {id}")))
    }

    pub fn get_version_at(&self, node_name: &str, ordinal: u32) -> Result<Version, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        self.storage
            .get_version_at(&node_name, ordinal)?
            .ok_or_else(|| {
                EngineError::NotFound(format!("version {ordinal} of node '{node_name}'"))
            })
    }

    /// All versions of a node, most recent first. An unknown node is `NotFound`.
    pub fn get_versions(&self, node_name: &str) -> Result<Vec<Version>, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        let versions = self.storage.get_versions(&node_name)?;
        if versions.is_empty() {
            return Err(EngineError::NotFound(format!("node '{node_name}'")));
        }
        tracing::debug!(node = %node_name, count = versions.len(), "versions listed");
        Ok(versions)
    }

    /// Zero for an unknown node, including a name no node could have.
    pub fn count_versions(&self, node_name: &str) -> Result<u64, EngineError> {
        match normalize_node_name(node_name) {
            Ok(node_name) => Ok(self.storage.count_versions(&node_name)?),
            Err(_) => Ok(0),
        }
    }

    /// Remove one version after the Deletion Guard approves it.
    pub fn delete_version(&mut self, id: VersionId) -> Result<Version, EngineError> {
        let removed = self.transaction(|engine| {
            let version = engine.get_version(id)?;
            engine.guard_delete(&version)?;
            engine.storage.delete_version(id)?;
            Ok(version)
        })?;
        tracing::info!(
            node = %removed.node_name,
            version_id = %removed.id,
            ordinal = removed.ordinal,
            "version deleted"
        );
        Ok(removed)
    }

    pub fn delete_version_at(&mut self, node_name: &str, ordinal: u32) -> Result<Version, EngineError> {
        let id = self.get_version_at(node_name, ordinal)?.id;
        self.delete_version(id)
    }

    /// Remove every version of a node, production included.
    pub fn delete_node(&mut self, node_name: &str) -> Result<u64, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        let removed = self.transaction(|engine| {
            let removed = engine.storage.delete_node(&node_name)?;
            if removed == 0 {
                return Err(EngineError::NotFound(format!("node '{node_name}'")));
            }
            Ok(removed)
        })?;
        tracing::info!(node = %node_name, removed, "node deleted");
        Ok(removed)
    }
}
