//! SQLite connection pool. Every checkout is wrapped in an [`Engine`].

use std::time::Duration;

use promptvault_storage::{SqliteStorage, schema::init_schema};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::Engine;
use crate::config::StoreLocation;
use crate::error::EngineError;

pub type StorePool = Pool<SqliteConnectionManager>;

/// An engine running on a checked-out connection; dropping it returns the
/// connection to the pool.
pub type PooledEngine = Engine<PooledConnection<SqliteConnectionManager>>;

/// Routes r2d2's background connection errors into tracing.
#[derive(Debug)]
struct LogErrors;

impl r2d2::HandleError<rusqlite::Error> for LogErrors {
    fn handle_error(&self, error: rusqlite::Error) {
        tracing::warn!(%error, "store connection failed");
    }
}

/// Build the pool and wait for its first connections, so a bad path fails here.
pub fn open_pool(
    location: &StoreLocation,
    max_size: u32,
    timeout: Duration,
) -> Result<StorePool, EngineError> {
    let manager = match location {
        StoreLocation::Memory => SqliteConnectionManager::memory(),
        StoreLocation::File(path) => SqliteConnectionManager::file(path),
    }
    .with_init(|conn| init_schema(conn));

    let mut builder = Pool::builder()
        .max_size(max_size)
        .connection_timeout(timeout)
        .error_handler(Box::new(LogErrors));
    if *location == StoreLocation::Memory {
        // The database lives and dies with its one connection.
        builder = builder.idle_timeout(None).max_lifetime(None);
    }

    let pool = builder.build(manager).map_err(EngineError::Open)?;
    tracing::debug!(?location, max_size, "store pool ready");
    Ok(pool)
}

pub fn checkout(pool: &StorePool) -> Result<PooledEngine, EngineError> {
    let conn = pool.get().map_err(|e| {
        tracing::warn!(max_size = pool.max_size(), error = %e, "no store connection available");
        EngineError::ConcurrencyFailure(format!("no store connection available: {e}"))
    })?;
    Ok(Engine::new(SqliteStorage::new(conn)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_pool_hands_out_one_engine_at_a_time() -> Result<(), EngineError> {
        let pool = open_pool(&StoreLocation::Memory, 1, Duration::from_millis(50))?;
        let held = checkout(&pool)?;
        let err = checkout(&pool).map(|_| ()).unwrap_err();
        assert!(err.is_retryable());
        drop(held);
        checkout(&pool)?;
        Ok(())
    }

    #[test]
    fn memory_store_keeps_its_rows_across_checkouts() -> Result<(), EngineError> {
        let pool = open_pool(&StoreLocation::Memory, 1, Duration::from_secs(1))?;
        let created = checkout(&pool)?.create_version(
            "n",
            &promptvault_core::ContentDraft::new("sys"),
            None,
            promptvault_core::RoleOrderPolicy::UserFirst,
        )?;
        assert_eq!(checkout(&pool)?.get_version(created.id)?, created);
        Ok(())
    }

    #[test]
    fn file_pool_shares_one_database() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let location = StoreLocation::File(dir.path().join("pool.db"));
        let pool = open_pool(&location, 2, Duration::from_millis(50))?;

        let mut a = checkout(&pool)?;
        let b = checkout(&pool)?;
        assert!(checkout(&pool).is_err());

        let created = a.create_version(
            "n",
            &promptvault_core::ContentDraft::new("sys"),
            None,
            promptvault_core::RoleOrderPolicy::UserFirst,
        )?;
        assert_eq!(b.count_versions("n")?, 1);
        assert_eq!(b.get_version(created.id)?.id, created.id);
        Ok(())
    }

    #[test]
    fn unopenable_store_fails_at_open() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let location = StoreLocation::File(dir.path().join("missing").join("vault.db"));
        let err = open_pool(&location, 1, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, EngineError::Open(_)));
        Ok(())
    }
}
