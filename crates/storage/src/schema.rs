use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 1;

/// Apply connection pragmas and create the schema if missing. Runs on every
/// new connection, so it must stay idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA busy_timeout = 5000;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    tracing::debug!(version = SCHEMA_VERSION, "schema ready");
    Ok(())
}

// At most one production row per node is enforced by idx_versions_production,
// so a half-applied promotion fails instead of leaving two.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS versions (
    rowid INTEGER PRIMARY KEY,
    version_id BLOB NOT NULL UNIQUE CHECK (length(version_id) = 16),
    node_name TEXT NOT NULL CHECK (length(node_name) > 0),
    ordinal INTEGER NOT NULL CHECK (ordinal > 0),
    content BLOB NOT NULL,
    checksum BLOB NOT NULL CHECK (length(checksum) = 32),
    message TEXT,
    production INTEGER NOT NULL DEFAULT 0 CHECK (production IN (0, 1)),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (node_name, ordinal)
);
CREATE INDEX IF NOT EXISTS idx_versions_node_created ON versions (node_name, created_at DESC, ordinal DESC);
CREATE UNIQUE INDEX IF NOT EXISTS idx_versions_production ON versions (node_name) WHERE production = 1;
";
