//! Production Tracker: the only writer of the `production` flag after creation.

use std::ops::Deref;

use promptvault_core::{Version, VersionId, version::normalize_node_name};
use promptvault_storage::Storage;
use rusqlite::Connection;

use crate::error::EngineError;
use crate::{Engine, now};

impl<C: Deref<Target = Connection>> Engine<C> {
    /// Make `id` the production version of its node.
    ///
    /// The old production version is cleared and the target set in the same
    /// transaction. Promoting the current production version is a no-op and
    /// leaves `updated_at` untouched.
    pub fn promote(&mut self, id: VersionId) -> Result<Version, EngineError> {
        let (promoted, previous) = self.transaction(|engine| {
            let target = engine.get_version(id)?;
            if target.production {
                return Ok((target, None));
            }

            let at = now();
            let previous = engine.storage.get_production(&target.node_name)?;
            if let Some(current) = &previous {
                engine.storage.set_production(current.id, false, at)?;
            }
            engine.storage.set_production(id, true, at)?;

            let promoted = engine.get_version(id)?;
            Ok((promoted, previous.map(|v| v.id)))
        })?;

        match previous {
            Some(previous) => tracing::info!(
                node = %promoted.node_name,
                version_id = %promoted.id,
                ordinal = promoted.ordinal,
                previous = %previous,
                "version promoted"
            ),
            None => tracing::debug!(
                node = %promoted.node_name,
                version_id = %promoted.id,
                "promote without previous production"
            ),
        }
        Ok(promoted)
    }

    /// `None` when the node has no versions.
    pub fn get_production(&self, node_name: &str) -> Result<Option<Version>, EngineError> {
        let node_name = normalize_node_name(node_name)?;
        Ok(self.storage().get_production(&node_name)?)
    }
}

#[cfg(test)]
mod tests {
    use promptvault_core::{ContentDraft, RoleOrderPolicy};
    use promptvault_storage::SqliteStorage;

    use super::*;

    fn engine_with(node: &str, count: usize) -> (Engine, Vec<Version>) {
        let mut engine = Engine::new(SqliteStorage::open_in_memory().unwrap());
        let versions = (0..count)
            .map(|i| {
                engine
                    .create_version(
                        node,
                        &ContentDraft::new(format!("prompt {i}")),
                        None,
                        RoleOrderPolicy::UserFirst,
                    )
                    .unwrap()
            })
            .collect();
        (engine, versions)
    }

    #[test]
    fn promote_moves_the_flag() -> Result<(), EngineError> {
        let (mut engine, versions) = engine_with("n", 3);
        let promoted = engine.promote(versions[2].id)?;
        assert!(promoted.production);

        assert!(!engine.get_version(versions[0].id)?.production);
        assert_eq!(engine.get_production("n")?.map(|v| v.id), Some(versions[2].id));
        Ok(())
    }

    #[test]
    fn promote_twice_is_a_noop() -> Result<(), EngineError> {
        let (mut engine, versions) = engine_with("n", 2);
        let first = engine.promote(versions[1].id)?;
        let second = engine.promote(versions[1].id)?;
        assert_eq!(first, second);
        assert_eq!(engine.storage().production_anomalies()?, Vec::new());
        Ok(())
    }

    #[test]
    fn promote_only_touches_its_node() -> Result<(), EngineError> {
        let (mut engine, versions) = engine_with("a", 2);
        let other = engine.create_version(
            "b",
            &ContentDraft::new("b"),
            None,
            RoleOrderPolicy::UserFirst,
        )?;
        engine.promote(versions[1].id)?;
        assert_eq!(engine.get_version(other.id)?, other);
        Ok(())
    }

    #[test]
    fn promote_leaves_content_alone() -> Result<(), EngineError> {
        let (mut engine, versions) = engine_with("n", 2);
        let promoted = engine.promote(versions[1].id)?;
        assert_eq!(promoted.content, versions[1].content);
        assert_eq!(promoted.created_at, versions[1].created_at);
        assert!(promoted.updated_at >= versions[1].updated_at);
        Ok(())
    }

    #[test]
    fn promote_unknown_is_not_found() {
        let (mut engine, _) = engine_with("n", 1);
        assert!(matches!(engine.promote(VersionId::new()), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn production_of_unknown_node_is_none() -> Result<(), EngineError> {
        let (engine, _) = engine_with("n", 1);
        assert_eq!(engine.get_production("ghost")?, None);
        Ok(())
    }
}
