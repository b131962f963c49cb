//! Single-slot storage for the form being filled in, plus debounced auto-save.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::DraftForm;
use crate::storage::{KeyValueStore, StorageError};

/// Store slot holding the unsaved draft, independent of the collection.
pub const DRAFT_KEY: &str = "character_vault.draft";

/// Quiet period after the last change before a draft is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

pub struct DraftStore<S> {
    store: Arc<S>,
}

impl<S> Clone for DraftStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: KeyValueStore> DraftStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Replaces whatever draft was there. Failures are logged and dropped.
    pub fn save(&self, draft: &DraftForm) {
        let result = serde_json::to_string(draft)
            .map_err(StorageError::from)
            .and_then(|json| self.store.set(DRAFT_KEY, &json));
        match result {
            Ok(()) => log::debug!("Draft saved"),
            Err(e) => log::error!("Could not save draft: {}", e),
        }
    }

    /// The saved draft, or `None` when there is none or it cannot be read.
    pub fn load(&self) -> Option<DraftForm> {
        let data = match self.store.get(DRAFT_KEY) {
            Ok(data) => data?,
            Err(e) => {
                log::error!("Could not load draft: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(draft) => Some(draft),
            Err(e) => {
                log::warn!("Ignoring unreadable draft: {}", e);
                None
            }
        }
    }

    pub fn clear(&self) {
        match self.store.remove(DRAFT_KEY) {
            Ok(()) => log::debug!("Draft cleared"),
            Err(e) => log::error!("Could not clear draft: {}", e),
        }
    }
}

/// Coalesces bursts of form changes into one draft write.
///
/// Each change re-arms the quiet window; only the latest value is written once
/// the window passes without another change.
pub struct DraftAutosaver {
    changes: mpsc::UnboundedSender<DraftForm>,
    worker: JoinHandle<()>,
}

impl DraftAutosaver {
    /// Must be called from within a tokio runtime.
    pub fn spawn<S>(drafts: DraftStore<S>, window: Duration) -> Self
    where
        S: KeyValueStore + 'static,
    {
        let (changes, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(debounce(rx, drafts, window));
        Self { changes, worker }
    }

    pub fn notify(&self, draft: DraftForm) {
        if self.changes.send(draft).is_err() {
            log::warn!("Draft autosaver has stopped, change not saved");
        }
    }

    /// Stops the worker. A change still inside its window is written first.
    pub async fn close(self) {
        drop(self.changes);
        if let Err(e) = self.worker.await {
            log::error!("Draft autosaver failed: {}", e);
        }
    }

    /// Stops the worker without writing a pending change.
    pub async fn cancel(self) {
        self.worker.abort();
        match self.worker.await {
            Err(e) if !e.is_cancelled() => log::error!("Draft autosaver failed: {}", e),
            _ => {}
        }
    }
}

async fn debounce<S: KeyValueStore>(
    mut rx: mpsc::UnboundedReceiver<DraftForm>,
    drafts: DraftStore<S>,
    window: Duration,
) {
    while let Some(mut latest) = rx.recv().await {
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(draft) => latest = draft,
                    None => {
                        drafts.save(&latest);
                        return;
                    }
                },
                _ = tokio::time::sleep(window) => {
                    drafts.save(&latest);
                    break;
                }
            }
        }
    }
}
