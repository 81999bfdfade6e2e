use std::fmt;

use promptvault_core::CoreError;
use promptvault_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

/// Why a mutation was refused although its target exists (or existed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    IsProduction,
    IsLastVersion,
    /// The version disappeared between lookup and the critical section.
    VersionRemoved,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsProduction => "is production",
            Self::IsLastVersion => "is last version",
            Self::VersionRemoved => "version was removed",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(ConflictReason),

    #[error("concurrency failure: {0}")]
    ConcurrencyFailure(String),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("core error: {0}")]
    Core(CoreError),

    #[error("cannot open store: {0}")]
    Open(r2d2::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Only lock contention is worth resubmitting unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyFailure(_))
    }

    pub fn conflict_reason(&self) -> Option<ConflictReason> {
        match self {
            Self::Conflict(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => Self::Validation(msg),
            other => Self::Core(other),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        if err.is_busy() {
            return Self::ConcurrencyFailure(err.to_string());
        }
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::Core(core) => core.into(),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_reasons_render_verbatim() {
        assert_eq!(
            EngineError::Conflict(ConflictReason::IsProduction).to_string(),
            "conflict: is production"
        );
        assert_eq!(ConflictReason::IsLastVersion.to_string(), "is last version");
    }

    #[test]
    fn busy_database_is_retryable() {
        let busy = rusqlite_busy();
        let err = EngineError::from(StorageError::Sqlite(busy));
        assert!(err.is_retryable());
        assert!(!EngineError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn core_validation_stays_validation() {
        let err = EngineError::from(StorageError::Core(CoreError::Validation("bad".into())));
        assert!(matches!(err, EngineError::Validation(_)));
    }

    fn rusqlite_busy() -> rusqlite::Error {
        // SQLITE_BUSY
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(5), None)
    }
}
