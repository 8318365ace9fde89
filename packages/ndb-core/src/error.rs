//! Error types for the ndb core library.

use thiserror::Error;

/// Errors surfaced by store, registry and configuration operations.
///
/// Malformed descriptor lines are deliberately absent: refresh counts them
/// (see [`crate::registry::SkipReason`]) instead of failing.
#[derive(Debug, Error)]
pub enum NdbError {
    /// Content rejected before any storage mutation.
    #[error("content too large ({len} characters, limit is {max})")]
    Validation { len: usize, max: usize },

    #[error("sqlite error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid filter: {0} (expected field=value)")]
    InvalidFilter(String),

    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

pub type Result<T> = std::result::Result<T, NdbError>;
