//! Reconciliation of the content store into the device table.

use super::descriptor::{self, Descriptor};
use super::{DeviceRecord, upsert};
use crate::cas::RawListing;
use crate::db::Database;
use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;

/// Content prefix scanned by a refresh
const SCAN_PREFIX: &str = "sys";

/// Counters reported by one refresh pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Records returned by the `sys` prefix scan
    pub scanned: usize,
    /// Device rows written
    pub upserted: usize,
    /// Descriptors dropped as malformed (no usable id or no valid tokens)
    pub skipped: usize,
}

/// Re-derive the device table from the content store.
///
/// Runs inside one write transaction. Malformed descriptors are counted and
/// skipped; any storage error rolls the whole pass back and is returned.
pub fn refresh(db: &mut Database) -> Result<RefreshSummary> {
    let tx = db.conn_mut().transaction()?;
    let summary = reconcile(&tx)?;
    tx.commit()?;

    tracing::info!(
        "Refresh complete: scanned {}, upserted {}, skipped {}",
        summary.scanned,
        summary.upserted,
        summary.skipped
    );
    Ok(summary)
}

fn reconcile(conn: &Connection) -> Result<RefreshSummary> {
    let mut summary = RefreshSummary::default();

    for record in &RawListing::new(conn, SCAN_PREFIX) {
        let record = record?;
        summary.scanned += 1;

        let fields = match descriptor::parse(&record.content) {
            Descriptor::Recognized(fields) => fields,
            Descriptor::Unrecognized => {
                tracing::trace!("Record {} is not a descriptor", record.id);
                continue;
            }
        };

        match DeviceRecord::from_fields(fields, &record) {
            Ok(device) => {
                upsert(conn, &device)?;
                summary.upserted += 1;
            }
            Err(reason) => {
                tracing::debug!("Skipping record {} (@{}): {}", record.id, record.hash, reason);
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}

impl Database {
    /// See [`refresh`].
    pub fn refresh(&mut self) -> Result<RefreshSummary> {
        refresh(self)
    }
}
