//! ndb Core Library
//!
//! This crate keeps a local registry of network devices:
//! - Append-only content store of raw text records (SQLite-backed)
//! - Descriptor parsing of `sys=... id=... ip=...` lines
//! - Refresh: reconcile descriptors into a normalized device table
//! - Query-by-example over the device table
//!
//! # Example
//!
//! ```no_run
//! use ndb_core::{Database, Filters};
//!
//! fn main() -> ndb_core::Result<()> {
//!     let mut db = Database::open("local.db")?;
//!     db.put("sys=feather-a id=cp-001 ip=192.168.0.10 category=cp")?;
//!
//!     let summary = db.refresh()?;
//!     println!("Upserted {} devices", summary.upserted);
//!
//!     for device in db.query(&Filters::new().with("ip", "192.168.0.10"))? {
//!         println!("{} {:?}", device.id, device.category);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cas;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod registry;

// Re-export commonly used types
pub use cas::{ContentRecord, MAX_CONTENT_CHARS, RawListing, RecordId};
pub use config::{ConfigSource, NdbConfig, load_config};
pub use db::{Database, StatusReport};
pub use error::{NdbError, Result};
pub use registry::{DeviceRecord, Filters, RefreshSummary, SkipReason, vocabulary};
