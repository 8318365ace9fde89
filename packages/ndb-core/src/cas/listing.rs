//! Lazy prefix listing over the content store.
//!
//! Pages through `cas` by id instead of holding one statement open, so the
//! caller may write to other tables on the same connection while iterating.

use super::{ContentRecord, RECORD_COLUMNS, record_from_row};
use crate::error::Result;
use rusqlite::{Connection, params};
use std::collections::VecDeque;

const PAGE_SIZE: i64 = 64;

/// Records whose content starts with a prefix, in insertion order.
///
/// Nothing is read until iteration starts; every call to [`RawListing::iter`]
/// starts again from the oldest record.
#[derive(Debug, Clone)]
pub struct RawListing<'conn> {
    conn: &'conn Connection,
    prefix: String,
}

impl<'conn> RawListing<'conn> {
    pub fn new(conn: &'conn Connection, prefix: &str) -> Self {
        Self {
            conn,
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn iter(&self) -> RawRecords<'conn> {
        RawRecords {
            conn: self.conn,
            prefix: self.prefix.clone(),
            after: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<'conn> IntoIterator for &RawListing<'conn> {
    type Item = Result<ContentRecord>;
    type IntoIter = RawRecords<'conn>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator produced by [`RawListing::iter`].
#[derive(Debug)]
pub struct RawRecords<'conn> {
    conn: &'conn Connection,
    prefix: String,
    after: i64,
    buffer: VecDeque<ContentRecord>,
    exhausted: bool,
}

impl RawRecords<'_> {
    fn fetch_page(&mut self) -> Result<()> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM cas \
             WHERE id > ?1 AND substr(content, 1, length(?2)) = ?2 \
             ORDER BY id \
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let page = stmt
            .query_map(params![self.after, self.prefix, PAGE_SIZE], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if (page.len() as i64) < PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.after = last.id.0;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for RawRecords<'_> {
    type Item = Result<ContentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::error::Result;

    #[test]
    fn test_prefix_filter_and_order() {
        let db = Database::open_in_memory().unwrap();
        db.put("sys=a id=1").unwrap();
        db.put("note: sys=hidden").unwrap();
        db.put("system=b").unwrap();
        db.put("SYS=c id=3").unwrap();
        db.put("sys=d id=4").unwrap();

        let contents: Vec<String> = db
            .list_raw("sys")
            .iter()
            .map(|r| r.map(|r| r.content))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(contents, vec!["sys=a id=1", "system=b", "sys=d id=4"]);
    }

    #[test]
    fn test_listing_spans_pages_and_restarts() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..150 {
            db.put(&format!("sys=dev-{i} id={i}")).unwrap();
        }

        let listing = db.list_raw("sys=");
        let first: Vec<i64> = listing
            .iter()
            .map(|r| r.map(|r| r.id.0))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(first.len(), 150);
        assert!(first.windows(2).all(|w| w[0] < w[1]));

        let second = listing.iter().count();
        assert_eq!(second, 150);
    }

    #[test]
    fn test_listing_is_lazy() {
        let db = Database::open_in_memory().unwrap();
        let listing = db.list_raw("sys");
        db.put("sys=late id=9").unwrap();
        assert_eq!(listing.iter().count(), 1);
    }
}
