//! SQLite handle shared by the content store and the device table.
//!
//! Both live in one database file so they can be browsed with any SQLite
//! tool. The schema is versioned through `PRAGMA user_version`.

use crate::error::{NdbError, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default database file, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "local.db";

/// Latest schema version this build knows how to migrate to
pub const SCHEMA_VERSION: i64 = 1;

/// An open ndb database.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

/// Database health summary for `ndb db status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub path: String,
    pub devices: usize,
    pub records: usize,
    pub descriptors: usize,
    /// Hashes of content backing a device, in device row order
    pub device_hashes: Vec<String>,
    /// Hashes of stored content not backing any device, oldest first
    pub orphans: Vec<String>,
}

impl Database {
    /// Open (creating if needed) the database file at `path` and migrate it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::trace!("Opened {:?} (journal_mode={})", path, mode);

        let mut db = Self {
            conn,
            path: Some(path),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open a private in-memory database (used by tests and dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn, path: None };
        db.migrate()?;
        Ok(db)
    }

    /// Path of the backing file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn migrate(&mut self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(NdbError::UnsupportedSchemaVersion {
                found: current,
                supported: SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let tx = self.conn.transaction()?;
            tx.execute_batch(include_str!("../migrations/0001_initial.sql"))?;
            tx.execute("PRAGMA user_version = 1", [])?;
            tx.commit()?;
            tracing::debug!("Migrated schema to version 1");
        }

        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Summarize table sizes and unreferenced content.
    pub fn status(&self) -> Result<StatusReport> {
        let devices = crate::registry::count(&self.conn)?;
        let records = crate::cas::count(&self.conn)?;
        let descriptors: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cas WHERE substr(content, 1, length(?1)) = ?1",
            [crate::registry::descriptor::DESCRIPTOR_PREFIX],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT record_hash FROM devices GROUP BY record_hash ORDER BY MIN(rowid)",
        )?;
        let device_hashes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT hash FROM cas \
             WHERE hash NOT IN (SELECT record_hash FROM devices) \
             GROUP BY hash \
             ORDER BY MIN(id)",
        )?;
        let orphans = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StatusReport {
            path: self
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".to_string()),
            devices,
            records,
            descriptors: descriptors as usize,
            device_hashes,
            orphans,
        })
    }
}
