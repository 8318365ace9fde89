//! Device registry: the normalized table derived from content records.
//!
//! The table is a materialized view. Rows are only written by
//! [`refresh`](crate::registry::refresh::refresh), always as full
//! replacements keyed by device id, so it can be rebuilt from the content
//! store at any time.

pub mod descriptor;
pub mod query;
pub mod refresh;
pub mod vocabulary;

pub use descriptor::{Descriptor, DESCRIPTOR_PREFIX};
pub use query::Filters;
pub use refresh::RefreshSummary;

use crate::cas::{self, ContentRecord, RecordId};
use crate::db::Database;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Latest known state of one device, using storage field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub sys: Option<String>,
    pub ip_address: Option<String>,
    pub category: Option<String>,
    /// Parsed keys without a dedicated column
    pub extra: BTreeMap<String, String>,
    /// Content record this row was derived from
    pub record_id: RecordId,
    pub record_hash: String,
}

/// Why a recognized descriptor did not become a device row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The line had no well-formed tokens at all
    NoValidTokens,
    /// No `id` token, or an empty one
    MissingId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoValidTokens => write!(f, "no valid tokens"),
            SkipReason::MissingId => write!(f, "missing id"),
        }
    }
}

impl DeviceRecord {
    /// Build a row from parsed descriptor fields, translating external names
    /// to storage columns.
    pub fn from_fields(
        fields: BTreeMap<String, String>,
        source: &ContentRecord,
    ) -> std::result::Result<Self, SkipReason> {
        if fields.is_empty() {
            return Err(SkipReason::NoValidTokens);
        }

        let mut columns: BTreeMap<&'static str, String> = BTreeMap::new();
        let mut extra = BTreeMap::new();
        // Columns filled through an alias; a literal column token loses to them.
        let mut aliased: Vec<&'static str> = Vec::new();

        for (key, value) in fields {
            let column = vocabulary::DEVICE_COLUMNS
                .iter()
                .copied()
                .find(|c| *c == vocabulary::storage_field(&key));
            let Some(column) = column else {
                extra.insert(key, value);
                continue;
            };

            if vocabulary::is_alias(&key) {
                aliased.push(column);
                columns.insert(column, value);
            } else if !aliased.contains(&column) {
                columns.insert(column, value);
            }
        }

        let id = columns
            .remove(vocabulary::ID_COLUMN)
            .filter(|id| !id.is_empty())
            .ok_or(SkipReason::MissingId)?;

        Ok(Self {
            id,
            sys: columns.remove("sys"),
            ip_address: columns.remove("ip_address"),
            category: columns.remove("category"),
            extra,
            record_id: source.id,
            record_hash: source.hash.clone(),
        })
    }

    /// Read any storage field by name: a persisted column or an extra key.
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "id" => Some(Cow::Borrowed(self.id.as_str())),
            "sys" => self.sys.as_deref().map(Cow::Borrowed),
            "ip_address" => self.ip_address.as_deref().map(Cow::Borrowed),
            "category" => self.category.as_deref().map(Cow::Borrowed),
            "record_id" => Some(Cow::Owned(self.record_id.to_string())),
            "record_hash" => Some(Cow::Borrowed(self.record_hash.as_str())),
            _ => self.extra.get(name).map(|v| Cow::Borrowed(v.as_str())),
        }
    }
}

pub(crate) const DEVICE_SELECT: &str =
    "SELECT id, sys, ip_address, category, extra, record_id, record_hash FROM devices";

pub(crate) fn device_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceRecord> {
    let extra_json: String = row.get(4)?;
    let extra = serde_json::from_str(&extra_json).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(err))
    })?;

    Ok(DeviceRecord {
        id: row.get(0)?,
        sys: row.get(1)?,
        ip_address: row.get(2)?,
        category: row.get(3)?,
        extra,
        record_id: RecordId(row.get(5)?),
        record_hash: row.get(6)?,
    })
}

/// Insert or fully replace the row for `device.id`.
///
/// Every non-key column is overwritten; the row keeps its position in the
/// table's natural order.
pub(crate) fn upsert(conn: &Connection, device: &DeviceRecord) -> Result<()> {
    let extra = serde_json::to_string(&device.extra)?;
    conn.prepare_cached(
        "INSERT INTO devices(id, sys, ip_address, category, extra, record_id, record_hash) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(id) DO UPDATE SET \
             sys = excluded.sys, \
             ip_address = excluded.ip_address, \
             category = excluded.category, \
             extra = excluded.extra, \
             record_id = excluded.record_id, \
             record_hash = excluded.record_hash",
    )?
    .execute(params![
        device.id,
        device.sys,
        device.ip_address,
        device.category,
        extra,
        device.record_id.0,
        device.record_hash,
    ])?;
    Ok(())
}

pub(crate) fn list(conn: &Connection) -> Result<Vec<DeviceRecord>> {
    let sql = format!("{DEVICE_SELECT} ORDER BY rowid");
    let mut stmt = conn.prepare(&sql)?;
    let devices = stmt
        .query_map([], device_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(devices)
}

pub(crate) fn get(conn: &Connection, id: &str) -> Result<Option<DeviceRecord>> {
    let sql = format!("{DEVICE_SELECT} WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], device_from_row).optional()?)
}

pub(crate) fn count(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
    Ok(n as usize)
}

impl Database {
    /// All devices in natural row order.
    pub fn devices(&self) -> Result<Vec<DeviceRecord>> {
        list(self.conn())
    }

    pub fn device(&self, id: &str) -> Result<Option<DeviceRecord>> {
        get(self.conn(), id)
    }

    pub fn device_count(&self) -> Result<usize> {
        count(self.conn())
    }

    /// The content record a device was last derived from.
    pub fn device_source(&self, id: &str) -> Result<Option<ContentRecord>> {
        match get(self.conn(), id)? {
            Some(device) => cas::get_record(self.conn(), device.record_id),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source(id: i64, content: &str) -> ContentRecord {
        ContentRecord {
            id: RecordId(id),
            hash: cas::hash_content(content),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    fn fields_of(content: &str) -> BTreeMap<String, String> {
        descriptor::parse(content).fields().cloned().unwrap()
    }

    #[test]
    fn test_from_fields_translates_ip() {
        let content = "sys=x id=1 ip=10.0.0.1 category=cp board=feather";
        let device = DeviceRecord::from_fields(fields_of(content), &source(7, content)).unwrap();

        assert_eq!(device.id, "1");
        assert_eq!(device.sys.as_deref(), Some("x"));
        assert_eq!(device.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(device.category.as_deref(), Some("cp"));
        assert_eq!(device.extra.len(), 1);
        assert_eq!(device.field("board").as_deref(), Some("feather"));
        assert_eq!(device.field("ip"), None);
        assert_eq!(device.field("record_id").as_deref(), Some("7"));
        assert_eq!(
            device.field("record_hash").as_deref(),
            Some(cas::hash_content(content).as_str())
        );
        assert_eq!(device.record_id, RecordId(7));
        assert_eq!(device.record_hash, cas::hash_content(content));
    }

    #[test]
    fn test_from_fields_requires_id() {
        let content = "sys=x ip=10.0.0.1";
        assert_eq!(
            DeviceRecord::from_fields(fields_of(content), &source(1, content)),
            Err(SkipReason::MissingId)
        );

        let content = "sys=x id= ip=10.0.0.1";
        assert_eq!(
            DeviceRecord::from_fields(fields_of(content), &source(1, content)),
            Err(SkipReason::MissingId)
        );

        assert_eq!(
            DeviceRecord::from_fields(BTreeMap::new(), &source(1, "sys==")),
            Err(SkipReason::NoValidTokens)
        );
    }

    #[test]
    fn test_alias_wins_over_literal_column_token() {
        let content = "sys=x id=1 ip_address=10.0.0.9 ip=10.0.0.1";
        let device = DeviceRecord::from_fields(fields_of(content), &source(1, content)).unwrap();
        assert_eq!(device.ip_address.as_deref(), Some("10.0.0.1"));

        let content = "sys=x id=1 ip_address=10.0.0.9";
        let device = DeviceRecord::from_fields(fields_of(content), &source(1, content)).unwrap();
        assert_eq!(device.ip_address.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_descriptor_cannot_set_provenance() {
        let content = "sys=x id=1 record_hash=forged record_id=99";
        let device = DeviceRecord::from_fields(fields_of(content), &source(3, content)).unwrap();
        assert_eq!(device.record_id, RecordId(3));
        assert_eq!(device.record_hash, cas::hash_content(content));
        assert_eq!(device.extra.get("record_hash").map(String::as_str), Some("forged"));
    }

    #[test]
    fn test_upsert_replaces_whole_row_and_keeps_order() {
        let db = Database::open_in_memory().unwrap();
        let first = db.put("sys=a id=1 ip=10.0.0.1 category=cp board=m4").unwrap();
        let second = db.put("sys=b id=2").unwrap();
        let third = db.put("sys=a2 id=1").unwrap();

        for id in [first, second, third] {
            let record = db.get_record(id).unwrap().unwrap();
            let device =
                DeviceRecord::from_fields(fields_of(&record.content), &record).unwrap();
            upsert(db.conn(), &device).unwrap();
        }

        let devices = db.devices().unwrap();
        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let replaced = db.device("1").unwrap().unwrap();
        assert_eq!(replaced.sys.as_deref(), Some("a2"));
        assert_eq!(replaced.ip_address, None);
        assert_eq!(replaced.category, None);
        assert!(replaced.extra.is_empty());
        assert_eq!(replaced.record_id, third);
        assert_eq!(db.device_count().unwrap(), 2);
    }

    #[test]
    fn test_device_source_returns_raw_record() {
        let mut db = Database::open_in_memory().unwrap();
        let content = "sys=feather-a id=cp-001 ip=192.168.0.10\nnotes: bench unit";
        db.put(content).unwrap();
        db.refresh().unwrap();

        let record = db.device_source("cp-001").unwrap().unwrap();
        assert_eq!(record.content, content);
        assert!(db.device_source("missing").unwrap().is_none());
    }
}
