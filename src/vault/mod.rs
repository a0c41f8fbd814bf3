//! Vault on disk: identity, path mapping and note enumeration

pub mod watcher;

pub use watcher::VaultWatcher;

use crate::notes::{hashing::normalize_relative_path, vault_id_for_root};
use crate::sync::error::{SyncError, SyncResult};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Directory depth limit for note enumeration.
const MAX_SCAN_DEPTH: usize = 10;

/// A vault root and its stable id.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    id: String,
}

impl Vault {
    /// Open the vault at `root`. Without an explicit id, the id is derived
    /// from the canonical root path.
    pub fn open(root: impl AsRef<Path>, explicit_id: Option<&str>) -> SyncResult<Self> {
        let root = root.as_ref();
        let root = root.canonicalize().map_err(|e| {
            SyncError::Configuration(format!("vault root {} is not accessible: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(SyncError::Configuration(format!(
                "vault root {} is not a directory",
                root.display()
            )));
        }

        let id = match explicit_id {
            Some(id) if id.trim().is_empty() => {
                return Err(SyncError::Configuration("vault id is empty".to_string()));
            }
            Some(id) => id.trim().to_string(),
            None => vault_id_for_root(&root),
        };

        Ok(Self { root, id })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `/`-separated path of `path` relative to the root, or `None` when the
    /// path lies outside the vault.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = match path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let canonical = path.canonicalize().ok()?;
                canonical.strip_prefix(&self.root).ok()?.to_path_buf()
            }
        };

        let parts: Vec<String> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Option<_>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(normalize_relative_path(&parts.join("/")))
    }

    /// Absolute path of a vault-relative path.
    pub fn absolute_path(&self, relative_path: &str) -> PathBuf {
        normalize_relative_path(relative_path)
            .split('/')
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    /// Every note in the vault, skipping hidden directories and symlinks.
    pub fn scan_notes(&self) -> Vec<PathBuf> {
        let mut notes: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .max_depth(MAX_SCAN_DEPTH)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_note_file(p))
            .collect();
        notes.sort();
        notes
    }

    /// Whether a path inside the vault should be synced.
    pub fn should_sync(&self, path: &Path) -> bool {
        if !is_note_file(path) {
            return false;
        }
        match self.relative_path(path) {
            Some(rel) => !rel.split('/').any(|part| part.starts_with('.')),
            None => false,
        }
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_note_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}
