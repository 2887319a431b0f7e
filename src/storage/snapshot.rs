//! Raw-content snapshot archive
//!
//! Every successfully fetched page is archived verbatim before the
//! structured record is upserted. Snapshots are write-once and never read
//! back by the crawler; the returned id ties a record to the exact bytes
//! it was extracted from.

use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SnapshotStore, StorageResult};

/// SQLite-backed snapshot archive
///
/// Uses its own connection so archival writes do not contend with record
/// upserts on the main store handle.
pub struct SqliteSnapshots {
    conn: Mutex<Connection>,
}

impl SqliteSnapshots {
    /// Opens (or creates) the archive in the database at the given path
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory archive (useful for tests)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Counts archived snapshots
    pub fn count(&self) -> StorageResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM html_snapshots", [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    }
}

impl SnapshotStore for SqliteSnapshots {
    fn store_snapshot(&self, key: &str, content: &[u8]) -> StorageResult<String> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO html_snapshots (url, content, stored_at) VALUES (?1, ?2, ?3)",
            params![key, content, Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid().to_string())
    }
}
