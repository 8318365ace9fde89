//! Query-by-example over the device table.
//!
//! Filters arrive in the external vocabulary and are translated to storage
//! fields here. Fixed columns are matched in SQL; anything else is compared
//! against each row's extra fields.

use super::{DEVICE_SELECT, DeviceRecord, device_from_row, vocabulary};
use crate::db::Database;
use crate::error::{NdbError, Result};
use rusqlite::Connection;

/// Exact-match filters, combined with AND
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pairs: Vec<(String, String)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Build filters from `field=value` strings, split on the first `=`.
    pub fn parse<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filters = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    filters.pairs.push((key.to_string(), value.to_string()));
                }
                _ => return Err(NdbError::InvalidFilter(pair.to_string())),
            }
        }
        Ok(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Filters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Devices matching every filter, in natural row order.
pub fn query(conn: &Connection, filters: &Filters) -> Result<Vec<DeviceRecord>> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    let mut residual = Vec::new();

    for (key, value) in filters.iter() {
        let field = vocabulary::storage_field(key);
        if vocabulary::is_column(field) {
            values.push(value);
            // `field` comes from the fixed column list, never from input
            clauses.push(format!("{field} = ?{}", values.len()));
        } else {
            residual.push((field, value));
        }
    }

    let mut sql = DEVICE_SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let mut devices = stmt
        .query_map(rusqlite::params_from_iter(values), device_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    devices.retain(|device| {
        residual
            .iter()
            .all(|(field, value)| device.extra.get(*field).map(String::as_str) == Some(*value))
    });

    tracing::debug!(
        "Query matched {} devices ({} column filters, {} extra filters)",
        devices.len(),
        clauses.len(),
        residual.len()
    );
    Ok(devices)
}

impl Database {
    /// See [`query`].
    pub fn query(&self, filters: &Filters) -> Result<Vec<DeviceRecord>> {
        query(self.conn(), filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        for line in [
            "sys=feather-a id=cp-001 ip=192.168.0.10 category=cp board=feather_m4",
            "sys=feather-b id=cp-002 ip=192.168.0.11 category=cp",
            "sys=esp-cam id=esp-003 ip=10.0.0.5 category=esp",
            "sys=printer id=misc-004 ip=192.168.0.200 category=other",
            "sys=unlabeled id=unlabeled-005",
        ] {
            db.put(line).unwrap();
        }
        db.refresh().unwrap();
        db
    }

    fn ids(devices: &[DeviceRecord]) -> Vec<&str> {
        devices.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_empty_filters_return_everything_in_order() {
        let db = seeded();
        let all = db.query(&Filters::new()).unwrap();
        assert_eq!(
            ids(&all),
            vec!["cp-001", "cp-002", "esp-003", "misc-004", "unlabeled-005"]
        );
    }

    #[test]
    fn test_category_filter() {
        let db = seeded();
        let cp = db.query(&Filters::new().with("category", "cp")).unwrap();
        assert_eq!(ids(&cp), vec!["cp-001", "cp-002"]);
    }

    #[test]
    fn test_ip_and_ip_address_are_equivalent() {
        let db = seeded();
        let external = db.query(&Filters::new().with("ip", "10.0.0.5")).unwrap();
        let internal = db
            .query(&Filters::new().with("ip_address", "10.0.0.5"))
            .unwrap();
        assert_eq!(ids(&external), vec!["esp-003"]);
        assert_eq!(external, internal);
    }

    #[test]
    fn test_filters_are_anded() {
        let db = seeded();
        let hit = db
            .query(&Filters::new().with("category", "cp").with("sys", "feather-b"))
            .unwrap();
        assert_eq!(ids(&hit), vec!["cp-002"]);

        let miss = db
            .query(&Filters::new().with("category", "esp").with("sys", "feather-b"))
            .unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn test_extra_fields_are_queryable() {
        let db = seeded();
        let hit = db
            .query(&Filters::new().with("board", "feather_m4"))
            .unwrap();
        assert_eq!(ids(&hit), vec!["cp-001"]);
    }

    #[test]
    fn test_unknown_key_yields_empty() {
        let db = seeded();
        let none = db
            .query(&Filters::new().with("hostname", "feather-a"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_provenance_columns_are_filterable() {
        let mut db = Database::open_in_memory().unwrap();
        db.put("sys=x id=1 ip=10.0.0.1").unwrap();
        db.put("sys=y id=2 record_hash=forged").unwrap();
        db.refresh().unwrap();
        let device = db.device("1").unwrap().unwrap();

        let by_hash = db
            .query(&Filters::new().with("record_hash", device.record_hash.clone()))
            .unwrap();
        assert_eq!(ids(&by_hash), vec!["1"]);

        let by_id = db
            .query(&Filters::new().with("record_id", device.record_id.to_string()))
            .unwrap();
        assert_eq!(ids(&by_id), vec!["1"]);

        // The stored column is matched, not a same-named descriptor token.
        let forged = db
            .query(&Filters::new().with("record_hash", "forged"))
            .unwrap();
        assert!(forged.is_empty());
    }

    #[test]
    fn test_values_are_not_sql() {
        let db = seeded();
        let none = db
            .query(&Filters::new().with("id", "x' OR '1'='1"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_parse_pairs() {
        let filters = Filters::parse(["ip=1.2.3.4", "note=a=b"]).unwrap();
        let pairs: Vec<(&str, &str)> = filters.iter().collect();
        assert_eq!(pairs, vec![("ip", "1.2.3.4"), ("note", "a=b")]);

        assert!(matches!(
            Filters::parse(["category"]),
            Err(NdbError::InvalidFilter(p)) if p == "category"
        ));
        assert!(Filters::parse(["=cp"]).is_err());
    }

    #[test]
    fn test_from_iterator() {
        let filters: Filters = [("ip", "10.0.0.5")].into_iter().collect();
        assert_eq!(filters, Filters::new().with("ip", "10.0.0.5"));
    }
}
