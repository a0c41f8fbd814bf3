//! Stable identifiers for vault notes
//!
//! Note ids are derived from the vault id and the vault-relative path, so the
//! same file always maps to the same graph node and vector payload, on any
//! machine and across restarts.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Derive the note id for a vault-relative path.
///
/// `sha256(vault_id ‖ relative_path)` as lowercase hex. Path separators are
/// normalized to `/` before hashing.
pub fn note_id(vault_id: &str, relative_path: &str) -> String {
    let normalized = normalize_relative_path(relative_path);

    let mut hasher = Sha256::new();
    hasher.update(vault_id.as_bytes());
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive a vault id from the canonical vault root (first 16 hex chars).
pub fn vault_id_for_root(root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Hash of the note body, stored in the vector payload to detect stale embeddings.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Canonical form of a vault-relative path: `/` separators, no empty or `.`
/// segments, `..` resolved against the preceding segment.
///
/// A `..` that would climb above the vault root is kept, so callers can
/// reject the path.
pub fn normalize_relative_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    segments.join("/")
}
