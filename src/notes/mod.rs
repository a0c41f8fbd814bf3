//! Vault notes
//!
//! Identity (note and vault ids) and Markdown extraction for the notes the
//! pipeline syncs.

pub mod hashing;
pub mod markdown;
pub mod models;
pub mod semantic;

pub use hashing::{content_hash, note_id, vault_id_for_root};
pub use models::{NoteLink, ParsedNote};
pub use semantic::{NoteSummary, SemanticKind, SemanticRelationship};
