//! Graph models for synced notes

use crate::notes::{NoteLink, ParsedNote};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A note node. Exactly one per `(id, vault_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNote {
    pub id: String,
    pub vault_id: String,
    pub title: String,
    pub path: String,
    pub content: String,
    pub modified: DateTime<Utc>,
}

impl GraphNote {
    pub fn from_parsed(note: &ParsedNote, modified: DateTime<Utc>) -> Self {
        Self {
            id: note.note_id.clone(),
            vault_id: note.vault_id.clone(),
            title: note.title.clone(),
            path: note.relative_path.clone(),
            content: note.content.clone(),
            modified,
        }
    }
}

/// Relationship types written by the sync executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// `(:Note)-[:HAS_TAG]->(:Tag)`
    HasTag,
    /// `(:Note)-[:LINKS_TO]->(:Note)`
    LinksTo,
}

impl RelationshipKind {
    /// Cypher relationship type.
    pub fn rel_type(&self) -> &'static str {
        match self {
            Self::HasTag => "HAS_TAG",
            Self::LinksTo => "LINKS_TO",
        }
    }

    /// Label of the target node.
    pub fn target_label(&self) -> &'static str {
        match self {
            Self::HasTag => "Tag",
            Self::LinksTo => "Note",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rel_type())
    }
}

/// Id of a tag node, scoped to the vault.
pub fn tag_id(vault_id: &str, name: &str) -> String {
    format!("tag_{}_{}", vault_id, name.to_lowercase())
}

/// One relationship to merge.
///
/// `target_name` is the tag name for `HasTag` and the target note's
/// vault-relative path for `LinksTo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipDescriptor {
    pub from_note_id: String,
    pub vault_id: String,
    pub kind: RelationshipKind,
    pub target_id: String,
    pub target_name: String,
}

impl RelationshipDescriptor {
    pub fn tag(note: &ParsedNote, name: &str) -> Self {
        Self {
            from_note_id: note.note_id.clone(),
            vault_id: note.vault_id.clone(),
            kind: RelationshipKind::HasTag,
            target_id: tag_id(&note.vault_id, name),
            target_name: name.to_string(),
        }
    }

    pub fn link(note: &ParsedNote, link: &NoteLink) -> Self {
        Self {
            from_note_id: note.note_id.clone(),
            vault_id: note.vault_id.clone(),
            kind: RelationshipKind::LinksTo,
            target_id: link.note_id.clone(),
            target_name: link.path.clone(),
        }
    }

    /// All relationships implied by a parsed note, tags first.
    pub fn for_note(note: &ParsedNote) -> Vec<Self> {
        note.tags
            .iter()
            .map(|tag| Self::tag(note, tag))
            .chain(note.links.iter().map(|link| Self::link(note, link)))
            .collect()
    }
}
