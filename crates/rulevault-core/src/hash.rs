//! Content-addressed version identity.
//!
//! A version id is a truncated Sha256 over `(rule_id, canonical content,
//! timestamp)`. Truncation keeps 128 bits (32 hex chars): wide enough that
//! ids are reproducible and collision-free across runtimes, short enough to
//! live in file names and logs.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::content::RuleContent;

/// Hex length of a truncated version id (128 bits).
pub const VERSION_ID_LEN: usize = 32;

/// Derive the version id for a rule snapshot taken at `timestamp`.
///
/// Deterministic: the same rule and canonical content at the same instant
/// always yield the same id.
/// The timestamp component makes re-submissions of identical content at a
/// later instant distinct versions, while a byte-identical rapid re-submit
/// collapses to the same id and is treated as a no-op upstream.
pub fn version_id(rule_id: &str, content: &RuleContent, timestamp: DateTime<Utc>) -> String {
    let digest = Sha256::new()
        .chain_update(rule_id.as_bytes())
        .chain_update(b":")
        .chain_update(content.canonical_json().as_bytes())
        .chain_update(b":")
        .chain_update(timestamp.to_rfc3339().as_bytes())
        .finalize();
    let hex = format!("{digest:x}");
    hex[..VERSION_ID_LEN].to_string()
}
