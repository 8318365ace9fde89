//! Append-only content store.
//!
//! Records are opaque text addressed by insertion id. Each record also
//! carries the SHA-256 of its content so it can be looked up by hash prefix,
//! but the same content may be stored any number of times.

mod listing;

pub use listing::{RawListing, RawRecords};

use crate::db::Database;
use crate::error::{NdbError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hard limit on record length, in characters
pub const MAX_CONTENT_CHARS: usize = 4096;

/// Insertion id of a content record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentRecord {
    pub id: RecordId,
    pub hash: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 hex digest of the UTF-8 content.
pub fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

pub(crate) const RECORD_COLUMNS: &str = "id, hash, content, created_at";

pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    let created_at: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })?;

    Ok(ContentRecord {
        id: RecordId(row.get(0)?),
        hash: row.get(1)?,
        content: row.get(2)?,
        created_at,
    })
}

/// Append one record. Oversized content is rejected before touching storage.
pub(crate) fn put(conn: &Connection, content: &str) -> Result<RecordId> {
    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(NdbError::Validation {
            len,
            max: MAX_CONTENT_CHARS,
        });
    }

    let hash = hash_content(content);
    conn.execute(
        "INSERT INTO cas(hash, content, created_at) VALUES (?1, ?2, ?3)",
        params![hash, content, Utc::now().to_rfc3339()],
    )?;
    let id = RecordId(conn.last_insert_rowid());

    tracing::debug!("Stored record {} ({} chars, @{})", id, len, hash);
    Ok(id)
}

pub(crate) fn get_record(conn: &Connection, id: RecordId) -> Result<Option<ContentRecord>> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM cas WHERE id = ?1");
    Ok(conn.query_row(&sql, [id.0], record_from_row).optional()?)
}

pub(crate) fn find_by_hash(conn: &Connection, key: &str) -> Result<Vec<ContentRecord>> {
    let key = key.strip_prefix('@').unwrap_or(key).to_ascii_lowercase();
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM cas \
         WHERE substr(hash, 1, length(?1)) = ?1 \
         ORDER BY hash, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([key], record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

pub(crate) fn count(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM cas", [], |row| row.get(0))?;
    Ok(n as usize)
}

impl Database {
    /// Append `content` to the store.
    ///
    /// Fails with [`NdbError::Validation`] when the content is longer than
    /// [`MAX_CONTENT_CHARS`] characters.
    pub fn put(&self, content: &str) -> Result<RecordId> {
        put(self.conn(), content)
    }

    /// Lazily list records whose content starts with `prefix`, oldest first.
    pub fn list_raw(&self, prefix: &str) -> RawListing<'_> {
        RawListing::new(self.conn(), prefix)
    }

    /// Look records up by full hash or hash prefix (an optional `@` is ignored).
    pub fn cas_get(&self, key: &str) -> Result<Vec<ContentRecord>> {
        find_by_hash(self.conn(), key)
    }

    pub fn get_record(&self, id: RecordId) -> Result<Option<ContentRecord>> {
        get_record(self.conn(), id)
    }

    pub fn record_count(&self) -> Result<usize> {
        count(self.conn())
    }
}
