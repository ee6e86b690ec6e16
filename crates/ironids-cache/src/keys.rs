//! Cache key construction.

/// Build the wire key for the filter storage snapshot.
///
/// Exactly one key is ever used per namespace: `"<key_prefix>.storage"`.
pub fn storage_key(prefix: &str) -> String {
    format!("{prefix}.storage")
}
