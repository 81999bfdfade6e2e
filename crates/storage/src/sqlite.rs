use std::ops::Deref;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use promptvault_core::{ContentHash, NodeSummary, PromptContent, Version, VersionId};

use crate::error::StorageError;
use crate::traits::{Storage, SummaryFilter};

const VERSION_COLUMNS: &str =
    "version_id, node_name, ordinal, content, checksum, message, production, created_at, updated_at";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(micros: i64, label: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StorageError::Serialization(format!("{label} out of range: {micros}")))
}

fn map_constraint(err: rusqlite::Error, what: impl FnOnce() -> String) -> StorageError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            StorageError::ConstraintViolation(what())
        }
        other => StorageError::Sqlite(other),
    }
}

/// Version storage over any handle to a SQLite connection: an owned one, or
/// a connection checked out of a pool.
pub struct SqliteStorage<C = Box<Connection>> {
    conn: C,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::new(Box::new(conn)))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::new(Box::new(conn)))
    }
}

impl<C: Deref<Target = Connection>> SqliteStorage<C> {
    /// Wrap a connection whose schema is already initialised.
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn query_versions<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<Version>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RawVersion::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawVersion::decode).collect()
    }

    fn query_version<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Option<Version>, StorageError> {
        Ok(self.query_versions(sql, params)?.into_iter().next())
    }
}

/// A `versions` row as SQLite hands it back, before checksum and content checks.
struct RawVersion {
    version_id: Vec<u8>,
    node_name: String,
    ordinal: i64,
    content: Vec<u8>,
    checksum: Vec<u8>,
    message: Option<String>,
    production: bool,
    created_at: i64,
    updated_at: i64,
}

impl RawVersion {
    fn read(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            version_id: row.get(0)?,
            node_name: row.get(1)?,
            ordinal: row.get(2)?,
            content: row.get(3)?,
            checksum: row.get(4)?,
            message: row.get(5)?,
            production: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn decode(self) -> Result<Version, StorageError> {
        let id = VersionId::from_bytes(to_array::<16>(self.version_id, "version_id")?);
        let corrupt = |reason: String| StorageError::Corrupt {
            version_id: id.to_string(),
            reason,
        };

        let stored = ContentHash::from_bytes(to_array::<32>(self.checksum, "checksum")?);
        if ContentHash::of(&self.content) != stored {
            return Err(corrupt("content checksum mismatch".into()));
        }
        let content =
            PromptContent::from_msgpack(&self.content).map_err(|e| corrupt(e.to_string()))?;
        content.check().map_err(|e| corrupt(e.to_string()))?;

        let ordinal = u32::try_from(self.ordinal)
            .map_err(|_| corrupt(format!("ordinal out of range: {}", self.ordinal)))?;

        Ok(Version {
            id,
            node_name: self.node_name,
            ordinal,
            content,
            message: self.message,
            production: self.production,
            created_at: from_micros(self.created_at, "created_at")?,
            updated_at: from_micros(self.updated_at, "updated_at")?,
        })
    }
}

fn read_summary(row: &rusqlite::Row) -> rusqlite::Result<(String, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_summary((node_name, count, latest): (String, i64, i64)) -> Result<NodeSummary, StorageError> {
    Ok(NodeSummary {
        node_name,
        prompt_count: count as u64,
        latest_created_at: from_micros(latest, "latest_created_at")?,
    })
}

impl<C: Deref<Target = Connection>> Storage for SqliteStorage<C> {
    fn insert_version(&mut self, version: &Version) -> Result<(), StorageError> {
        let content = version.content.to_msgpack()?;
        let checksum = ContentHash::of(&content);
        self.conn
            .execute(
                "INSERT INTO versions (version_id, node_name, ordinal, content, checksum, message, production, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    version.id.as_bytes().as_slice(),
                    version.node_name,
                    i64::from(version.ordinal),
                    content,
                    checksum.as_bytes().as_slice(),
                    version.message,
                    version.production,
                    to_micros(version.created_at),
                    to_micros(version.updated_at),
                ],
            )
            .map_err(|e| {
                map_constraint(e, || {
                    format!(
                        "cannot insert version {} of node '{}' (ordinal {})",
                        version.id, version.node_name, version.ordinal
                    )
                })
            })?;
        Ok(())
    }

    fn get_version(&self, id: VersionId) -> Result<Option<Version>, StorageError> {
        self.query_version(
            &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE version_id = ?1"),
            rusqlite::params![id.as_bytes().as_slice()],
        )
    }

    fn get_version_at(
        &self,
        node_name: &str,
        ordinal: u32,
    ) -> Result<Option<Version>, StorageError> {
        self.query_version(
            &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE node_name = ?1 AND ordinal = ?2"),
            rusqlite::params![node_name, i64::from(ordinal)],
        )
    }

    fn get_versions(&self, node_name: &str) -> Result<Vec<Version>, StorageError> {
        self.query_versions(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM versions WHERE node_name = ?1 ORDER BY created_at DESC, ordinal DESC"
            ),
            rusqlite::params![node_name],
        )
    }

    fn get_production(&self, node_name: &str) -> Result<Option<Version>, StorageError> {
        self.query_version(
            &format!("SELECT {VERSION_COLUMNS} FROM versions WHERE node_name = ?1 AND production = 1"),
            rusqlite::params![node_name],
        )
    }

    fn count_versions(&self, node_name: &str) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM versions WHERE node_name = ?1",
            rusqlite::params![node_name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn max_ordinal(&self, node_name: &str) -> Result<Option<u32>, StorageError> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(ordinal) FROM versions WHERE node_name = ?1",
            rusqlite::params![node_name],
            |row| row.get(0),
        )?;
        max.map(|m| {
            u32::try_from(m)
                .map_err(|_| StorageError::Serialization(format!("ordinal out of range: {m}")))
        })
        .transpose()
    }

    fn set_production(
        &mut self,
        id: VersionId,
        production: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let changed = self
            .conn
            .execute(
                "UPDATE versions SET production = ?1, updated_at = ?2 WHERE version_id = ?3",
                rusqlite::params![production, to_micros(at), id.as_bytes().as_slice()],
            )
            .map_err(|e| map_constraint(e, || format!("node of {id} already has a production version")))?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("version {id}")));
        }
        Ok(())
    }

    fn delete_version(&mut self, id: VersionId) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            "DELETE FROM versions WHERE version_id = ?1",
            rusqlite::params![id.as_bytes().as_slice()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("version {id}")));
        }
        Ok(())
    }

    fn delete_node(&mut self, node_name: &str) -> Result<u64, StorageError> {
        let removed = self.conn.execute(
            "DELETE FROM versions WHERE node_name = ?1",
            rusqlite::params![node_name],
        )?;
        Ok(removed as u64)
    }

    fn node_summaries(&self, filter: &SummaryFilter<'_>) -> Result<Vec<NodeSummary>, StorageError> {
        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT node_name, COUNT(*), MAX(created_at) FROM versions
             WHERE ?1 IS NULL OR instr(lower(node_name), lower(?1)) > 0
             GROUP BY node_name
             ORDER BY MAX(created_at) DESC, node_name ASC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(
                rusqlite::params![filter.name_contains, limit, filter.offset as i64],
                read_summary,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(decode_summary).collect()
    }

    fn count_nodes(&self, name_contains: Option<&str>) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT node_name) FROM versions
             WHERE ?1 IS NULL OR instr(lower(node_name), lower(?1)) > 0",
            rusqlite::params![name_contains],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn node_summary(&self, node_name: &str) -> Result<Option<NodeSummary>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT node_name, COUNT(*), MAX(created_at) FROM versions WHERE node_name = ?1 GROUP BY node_name",
                rusqlite::params![node_name],
                read_summary,
            )
            .optional()?;
        row.map(decode_summary).transpose()
    }

    fn production_anomalies(&self) -> Result<Vec<(String, u64)>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT node_name, SUM(production) FROM versions GROUP BY node_name HAVING SUM(production) != 1 ORDER BY node_name",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(|(node, n)| (node, n as u64)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use promptvault_core::{ContentDraft, RoleOrderPolicy};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn version(node: &str, ordinal: u32, production: bool, secs: i64) -> Version {
        Version {
            id: VersionId::new(),
            node_name: node.to_string(),
            ordinal,
            content: ContentDraft::new(format!("{node} v{ordinal}"))
                .with_user("Hi")
                .build(RoleOrderPolicy::UserFirst)
                .unwrap(),
            message: None,
            production,
            created_at: at(secs),
            updated_at: at(secs),
        }
    }

    #[test]
    fn insert_then_get_returns_identical_record() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let mut v = version("greeter", 1, true, 0);
        v.message = Some("first".into());
        storage.insert_version(&v)?;

        assert_eq!(storage.get_version(v.id)?, Some(v.clone()));
        assert_eq!(storage.get_version_at("greeter", 1)?, Some(v));
        assert_eq!(storage.get_version_at("greeter", 2)?, None);
        Ok(())
    }

    #[test]
    fn versions_are_newest_first_with_ordinal_tiebreak() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        storage.insert_version(&version("n", 1, true, 0))?;
        storage.insert_version(&version("n", 2, false, 10))?;
        storage.insert_version(&version("n", 3, false, 10))?;
        storage.insert_version(&version("other", 1, true, 20))?;

        let ordinals: Vec<u32> = storage.get_versions("n")?.iter().map(|v| v.ordinal).collect();
        assert_eq!(ordinals, vec![3, 2, 1]);
        assert_eq!(storage.count_versions("n")?, 3);
        assert_eq!(storage.max_ordinal("n")?, Some(3));
        assert_eq!(storage.max_ordinal("missing")?, None);
        Ok(())
    }

    #[test]
    fn second_production_row_is_rejected() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let a = version("n", 1, true, 0);
        let b = version("n", 2, false, 1);
        storage.insert_version(&a)?;
        storage.insert_version(&b)?;

        let err = storage.set_production(b.id, true, at(2)).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
        assert_eq!(storage.get_production("n")?.map(|v| v.id), Some(a.id));
        Ok(())
    }

    #[test]
    fn duplicate_ordinal_is_rejected() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        storage.insert_version(&version("n", 1, true, 0))?;
        let err = storage.insert_version(&version("n", 1, false, 1)).unwrap_err();
        assert!(matches!(err, StorageError::ConstraintViolation(_)));
        Ok(())
    }

    #[test]
    fn set_production_touches_updated_at() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let v = version("n", 1, false, 0);
        storage.insert_version(&v)?;
        storage.set_production(v.id, true, at(30))?;

        let stored = storage.get_version(v.id)?.unwrap();
        assert!(stored.production);
        assert_eq!(stored.updated_at, at(30));
        assert_eq!(stored.created_at, at(0));
        assert_eq!(stored.content, v.content);
        Ok(())
    }

    #[test]
    fn missing_rows_report_not_found() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let ghost = VersionId::new();
        assert!(matches!(
            storage.set_production(ghost, true, at(0)),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(storage.delete_version(ghost), Err(StorageError::NotFound(_))));
        assert_eq!(storage.delete_node("nobody")?, 0);
        Ok(())
    }

    #[test]
    fn tampered_content_is_detected() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        let v = version("n", 1, true, 0);
        storage.insert_version(&v)?;
        storage.conn().execute(
            "UPDATE versions SET content = x'00' WHERE version_id = ?1",
            rusqlite::params![v.id.as_bytes().as_slice()],
        )?;

        assert!(matches!(storage.get_version(v.id), Err(StorageError::Corrupt { .. })));
        Ok(())
    }

    #[test]
    fn summaries_group_filter_and_page() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        storage.insert_version(&version("search", 1, true, 0))?;
        storage.insert_version(&version("search", 2, false, 50))?;
        storage.insert_version(&version("Summarize", 1, true, 40))?;
        storage.insert_version(&version("greeter", 1, true, 10))?;

        let all = storage.node_summaries(&SummaryFilter::default())?;
        let names: Vec<&str> = all.iter().map(|s| s.node_name.as_str()).collect();
        assert_eq!(names, vec!["search", "Summarize", "greeter"]);
        assert_eq!(all[0].prompt_count, 2);
        assert_eq!(all[0].latest_created_at, at(50));

        let filtered = storage.node_summaries(&SummaryFilter {
            name_contains: Some("SUM"),
            ..Default::default()
        })?;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].node_name, "Summarize");
        assert_eq!(storage.count_nodes(Some("s"))?, 2);
        assert_eq!(storage.count_nodes(None)?, 3);

        let second = storage.node_summaries(&SummaryFilter {
            name_contains: None,
            limit: Some(1),
            offset: 1,
        })?;
        assert_eq!(second[0].node_name, "Summarize");

        assert_eq!(storage.node_summary("greeter")?.map(|s| s.prompt_count), Some(1));
        assert_eq!(storage.node_summary("missing")?, None);
        Ok(())
    }

    #[test]
    fn anomalies_list_nodes_without_production() -> Result<(), StorageError> {
        let mut storage = SqliteStorage::open_in_memory()?;
        storage.insert_version(&version("ok", 1, true, 0))?;
        storage.insert_version(&version("orphan", 1, false, 0))?;
        assert_eq!(storage.production_anomalies()?, vec![("orphan".to_string(), 0)]);
        Ok(())
    }

    #[test]
    fn file_store_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vault.db");
        let path = path.to_str().ok_or("non-utf8 temp path")?;
        let v = version("n", 1, true, 0);
        {
            let mut storage = SqliteStorage::open(path)?;
            storage.insert_version(&v)?;
        }
        let storage = SqliteStorage::open(path)?;
        assert_eq!(storage.get_version(v.id)?, Some(v));
        Ok(())
    }

    #[test]
    fn borrowed_connection_shares_rows() -> Result<(), StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        let v = version("n", 1, true, 0);
        SqliteStorage::new(&conn).insert_version(&v)?;

        let storage = SqliteStorage::new(&conn);
        assert_eq!(storage.get_version(v.id)?, Some(v));
        Ok(())
    }
}
