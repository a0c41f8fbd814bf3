//! Parsed note model
//!
//! A `ParsedNote` is everything the sync executor derives from one note
//! snapshot before touching the stores.

use super::hashing::{content_hash, note_id, normalize_relative_path};
use super::markdown;
use serde::{Deserialize, Serialize};

/// Outgoing link from one note to another, already resolved to a note id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteLink {
    pub path: String,
    pub note_id: String,
}

/// A note snapshot with its derived identifiers and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedNote {
    pub note_id: String,
    pub vault_id: String,
    pub relative_path: String,
    pub title: String,
    /// Top-level folder, `general` at the vault root
    pub domain: String,
    pub tags: Vec<String>,
    pub links: Vec<NoteLink>,
    /// `None` when the content has no readable text (vector indexing is skipped)
    pub description: Option<String>,
    pub content_hash: String,
    pub content: String,
}

impl ParsedNote {
    /// Parse a note snapshot.
    pub fn parse(vault_id: &str, relative_path: &str, content: &str) -> Self {
        let relative_path = normalize_relative_path(relative_path);
        let title = markdown::extract_title(&relative_path);
        let description = markdown::extract_description(content, &title);

        let links = markdown::extract_links(content, &relative_path)
            .into_iter()
            .map(|path| NoteLink {
                note_id: note_id(vault_id, &path),
                path,
            })
            .collect();

        Self {
            note_id: note_id(vault_id, &relative_path),
            vault_id: vault_id.to_string(),
            domain: markdown::extract_domain(&relative_path),
            tags: markdown::extract_tags(content),
            links,
            description,
            content_hash: content_hash(content),
            content: content.to_string(),
            title,
            relative_path,
        }
    }

    /// Text fed to the embedding model.
    pub fn embedding_text(&self) -> Option<String> {
        self.description
            .as_ref()
            .map(|d| format!("{}\n\n{}", self.title, d))
    }

    /// Whether vector indexing applies to this note.
    pub fn is_indexable(&self) -> bool {
        self.description.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_derives_everything() {
        let content = "#idea about [[projects/beta]]\n\nA long enough paragraph to become the description of this note.";
        let note = ParsedNote::parse("vault", "projects/alpha.md", content);

        assert_eq!(note.note_id, note_id("vault", "projects/alpha.md"));
        assert_eq!(note.title, "alpha");
        assert_eq!(note.domain, "projects");
        assert_eq!(note.tags, vec!["idea"]);
        assert_eq!(
            note.links,
            vec![NoteLink {
                path: "projects/beta.md".into(),
                note_id: note_id("vault", "projects/beta.md"),
            }]
        );
        assert_eq!(
            note.description.as_deref(),
            Some("A long enough paragraph to become the description of this note.")
        );
        assert_eq!(note.content_hash, content_hash(content));
    }

    #[test]
    fn test_embedding_text_combines_title_and_description() {
        let note = ParsedNote::parse("v", "todo.md", "buy milk");
        assert_eq!(note.embedding_text().as_deref(), Some("todo\n\ntodo"));
        assert!(note.is_indexable());
    }

    #[test]
    fn test_empty_note_is_not_indexable() {
        let note = ParsedNote::parse("v", "empty.md", "   \n");
        assert!(!note.is_indexable());
        assert!(note.embedding_text().is_none());
        assert_eq!(note.title, "empty");
    }

    #[test]
    fn test_parse_normalizes_path() {
        let a = ParsedNote::parse("v", "dir\\note.md", "x");
        let b = ParsedNote::parse("v", "dir/note.md", "x");
        assert_eq!(a.note_id, b.note_id);
        assert_eq!(a.relative_path, "dir/note.md");
    }
}
