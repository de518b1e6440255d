//! SQLite storage implementation
//!
//! [`SqliteStore`] owns the single read/write connection. [`SqliteReader`]
//! opens additional read-only connections to the same file; with WAL
//! journaling those readers never block the writer.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ReadStore, Store, StoreError, StoreResult};
use crate::storage::{Namespace, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Read/write SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (or creates) the database and its namespaces
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open database
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Opens a read-only connection to the same database file
    pub fn reader(&self) -> StoreResult<SqliteReader> {
        match &self.path {
            Some(path) => SqliteReader::open(path),
            None => Err(StoreError::Sqlite(rusqlite::Error::InvalidPath(
                PathBuf::from(":memory:"),
            ))),
        }
    }
}

/// Read-only SQLite connection
pub struct SqliteReader {
    conn: Connection,
}

impl SqliteReader {
    /// Opens an existing database without write access
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }
}

fn get_value(conn: &Connection, namespace: Namespace, key: &str) -> StoreResult<Option<String>> {
    let sql = format!("SELECT value FROM {} WHERE key = ?1", namespace.table());
    let value = conn
        .query_row(&sql, params![key], |row| row.get(0))
        .optional()?;
    Ok(value)
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
    })
}

fn count_entries(conn: &Connection, namespace: Namespace) -> StoreResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", namespace.table());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

fn list_checkpoints(conn: &Connection) -> StoreResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM file_checkpoints ORDER BY key")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn latest_run_record(conn: &Connection) -> StoreResult<Option<RunRecord>> {
    let run = conn
        .query_row(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
            [],
            row_to_run,
        )
        .optional()?;
    Ok(run)
}

impl ReadStore for SqliteReader {
    fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>> {
        get_value(&self.conn, namespace, key)
    }

    fn count(&self, namespace: Namespace) -> StoreResult<u64> {
        count_entries(&self.conn, namespace)
    }

    fn checkpoints(&self) -> StoreResult<Vec<(String, String)>> {
        list_checkpoints(&self.conn)
    }

    fn latest_run(&self) -> StoreResult<Option<RunRecord>> {
        latest_run_record(&self.conn)
    }
}

impl ReadStore for SqliteStore {
    fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>> {
        get_value(&self.conn, namespace, key)
    }

    fn count(&self, namespace: Namespace) -> StoreResult<u64> {
        count_entries(&self.conn, namespace)
    }

    fn checkpoints(&self) -> StoreResult<Vec<(String, String)>> {
        list_checkpoints(&self.conn)
    }

    fn latest_run(&self) -> StoreResult<Option<RunRecord>> {
        latest_run_record(&self.conn)
    }
}

impl Store for SqliteStore {
    fn put(&mut self, namespace: Namespace, key: &str, value: &str) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let sql = match namespace {
            // first success wins
            Namespace::UrlCache => {
                "INSERT OR IGNORE INTO url_cache (key, value, recorded_at) VALUES (?1, ?2, ?3)"
            }
            Namespace::FileCheckpoints => {
                "INSERT INTO file_checkpoints (key, value, recorded_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, recorded_at = excluded.recorded_at"
            }
        };
        self.conn.execute(sql, params![key, value, now])?;
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StoreResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StoreError::RunNotFound(run_id));
        }
        Ok(())
    }
}
