//! Deletion Guard: refuses removals that would break the one-production rule.

use std::ops::Deref;

use promptvault_core::Version;
use promptvault_storage::Storage;
use rusqlite::Connection;

use crate::Engine;
use crate::error::{ConflictReason, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteVerdict {
    Allow,
    Deny(ConflictReason),
}

/// Decide whether `version` may be removed from a node holding
/// `versions_in_node` versions.
///
/// The last-version rule is checked first: a lone version is always the
/// production one, and callers get the more specific reason.
pub fn can_delete(version: &Version, versions_in_node: u64) -> DeleteVerdict {
    if versions_in_node <= 1 {
        DeleteVerdict::Deny(ConflictReason::IsLastVersion)
    } else if version.production {
        DeleteVerdict::Deny(ConflictReason::IsProduction)
    } else {
        DeleteVerdict::Allow
    }
}

impl<C: Deref<Target = Connection>> Engine<C> {
    pub fn check_delete(&self, version: &Version) -> Result<DeleteVerdict, EngineError> {
        let count = self.storage().count_versions(&version.node_name)?;
        Ok(can_delete(version, count))
    }

    pub(crate) fn guard_delete(&self, version: &Version) -> Result<(), EngineError> {
        match self.check_delete(version)? {
            DeleteVerdict::Allow => Ok(()),
            DeleteVerdict::Deny(reason) => {
                tracing::warn!(
                    node = %version.node_name,
                    version_id = %version.id,
                    ordinal = version.ordinal,
                    %reason,
                    "delete refused"
                );
                Err(EngineError::Conflict(reason))
            }
        }
    }
}
