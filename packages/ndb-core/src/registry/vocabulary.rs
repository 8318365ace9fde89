//! Translation between external field names and device table columns.
//!
//! Descriptor lines, query filters and rendered output all speak the
//! external vocabulary (`ip`); the persisted schema uses `ip_address`.
//! This table is the only place the two are related.

/// (external name, storage column)
const ALIASES: &[(&str, &str)] = &[("ip", "ip_address")];

/// Identity column of the device table
pub const ID_COLUMN: &str = "id";

/// Fixed device table columns a descriptor can fill
pub const DEVICE_COLUMNS: &[&str] = &[ID_COLUMN, "sys", "ip_address", "category"];

/// Columns recording which content record a row came from. Filterable, but
/// never written from descriptor tokens.
pub const PROVENANCE_COLUMNS: &[&str] = &["record_id", "record_hash"];

/// Storage field for an external name. Unknown names pass through unchanged.
pub fn storage_field(external: &str) -> &str {
    ALIASES
        .iter()
        .find(|(ext, _)| *ext == external)
        .map(|(_, storage)| *storage)
        .unwrap_or(external)
}

/// External name for a storage field. Unknown names pass through unchanged.
pub fn external_field(storage: &str) -> &str {
    ALIASES
        .iter()
        .find(|(_, col)| *col == storage)
        .map(|(ext, _)| *ext)
        .unwrap_or(storage)
}

/// True if `external` was renamed on its way to storage.
pub fn is_alias(external: &str) -> bool {
    ALIASES.iter().any(|(ext, _)| *ext == external)
}

/// True if `field` is a persisted column rather than an extra key.
pub fn is_column(field: &str) -> bool {
    DEVICE_COLUMNS.contains(&field) || PROVENANCE_COLUMNS.contains(&field)
}
