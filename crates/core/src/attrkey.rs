//! Conversion between the public dot notation for structural attributes
//! (`doc.author`) and the column notation used in database tables
//! (`doc_author`).
//!
//! Only the separator between structure and attribute is converted; an
//! attribute name may itself contain underscores, which is why only the
//! first occurrence is touched on export.

/// Convert a public attribute key (`doc.author`) to its column form
/// (`doc_author`). Keys already in column form pass through unchanged.
pub fn import_key(key: &str) -> String {
    key.replacen('.', "_", 1)
}

/// Convert a column name (`doc_author`) back to the public dot notation
/// (`doc.author`).
pub fn export_key(column: &str) -> String {
    column.replacen('_', ".", 1)
}
