//! File watcher feeding vault changes into the sync pipeline
//!
//! Events are only forwarded to the pipeline queue; debouncing happens there.

use crate::sync::SyncPipeline;
use anyhow::Result;
use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What a filesystem event means for a note.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NoteEvent {
    Changed(PathBuf),
    Removed(PathBuf),
}

/// Watches the vault root and enqueues note changes
pub struct VaultWatcher {
    pipeline: Arc<SyncPipeline>,
    stop_tx: Option<mpsc::Sender<()>>,
}

impl VaultWatcher {
    pub fn new(pipeline: Arc<SyncPipeline>) -> Self {
        Self {
            pipeline,
            stop_tx: None,
        }
    }

    /// Start the watcher background task
    pub async fn start(&mut self) -> Result<()> {
        if self.stop_tx.is_some() {
            return Ok(());
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let (event_tx, mut event_rx) = mpsc::channel::<NoteEvent>(1024);
        self.stop_tx = Some(stop_tx);

        let pipeline = self.pipeline.clone();
        let root = pipeline.vault().root().to_path_buf();

        tokio::spawn(async move {
            let mut watcher = match RecommendedWatcher::new(
                move |res: Result<Event, notify::Error>| match res {
                    Ok(event) => {
                        for note_event in classify(event) {
                            let _ = event_tx.blocking_send(note_event);
                        }
                    }
                    Err(e) => tracing::warn!("Watch error: {}", e),
                },
                Config::default().with_poll_interval(Duration::from_secs(2)),
            ) {
                Ok(w) => w,
                Err(e) => {
                    tracing::error!("Failed to create vault watcher: {}", e);
                    return;
                }
            };

            if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
                tracing::error!("Failed to watch {}: {}", root.display(), e);
                return;
            }
            tracing::info!("Watching vault: {}", root.display());

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Vault watcher stopping");
                        break;
                    }
                    Some(event) = event_rx.recv() => handle(&pipeline, event).await,
                }
            }
        });

        Ok(())
    }

    /// Stop the watcher
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(()).await;
        }
    }
}

async fn handle(pipeline: &SyncPipeline, event: NoteEvent) {
    let vault = pipeline.vault();
    match event {
        NoteEvent::Changed(path) if path.is_file() => {
            if !vault.should_sync(&path) {
                return;
            }
            tracing::debug!("Note changed: {}", path.display());
            if let Err(e) = pipeline.enqueue_file(&path).await {
                tracing::warn!("Failed to queue {}: {:#}", path.display(), e);
            }
        }
        NoteEvent::Changed(path) | NoteEvent::Removed(path) => {
            if path.exists() || !vault.should_sync(&path) {
                return;
            }
            if let Some(relative_path) = vault.relative_path(&path) {
                tracing::debug!("Note removed: {}", relative_path);
                pipeline.enqueue_removal(&relative_path).await;
            }
        }
    }
}

/// Map a raw notify event to note events. Renames surface as a change for
/// the new path and a removal for the old one once it no longer exists.
fn classify(event: Event) -> Vec<NoteEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            event.paths.into_iter().map(NoteEvent::Changed).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .map(|p| {
                if p.exists() {
                    NoteEvent::Changed(p)
                } else {
                    NoteEvent::Removed(p)
                }
            })
            .collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(NoteEvent::Removed).collect(),
        _ => Vec::new(),
    }
}
