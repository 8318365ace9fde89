//! Bulk loading of `.ndb` text files into the content store.
//!
//! One record per line. Blank lines and lines starting with `#` are ignored.

use crate::cas::RecordId;
use crate::db::Database;
use crate::error::Result;
use std::path::Path;

/// Store every record line of `text`, in order.
///
/// Stops at the first line that fails; lines stored before it stay stored.
pub fn ingest_str(db: &Database, text: &str) -> Result<Vec<RecordId>> {
    let mut ids = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        ids.push(db.put(line)?);
    }
    tracing::info!("Ingested {} records", ids.len());
    Ok(ids)
}

pub fn ingest_file(db: &Database, path: impl AsRef<Path>) -> Result<Vec<RecordId>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    tracing::debug!("Ingesting {:?}", path);
    ingest_str(db, &text)
}
