//! Debounced autosave for one open document.
//!
//! Every edit lands in the in-memory buffer at once and restarts a single
//! pending save. The save fires after the window passes with no further
//! edits and carries the latest content. Failed saves are reported through
//! the status channel and not retried; dropping the [`Autosaver`] abandons a
//! save that has not fired yet. A save still in flight when a newer edit
//! arrives runs to completion but no longer reports its outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::ClientError;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Where debounced content gets persisted.
#[async_trait]
pub trait DocumentSink: Send + Sync + 'static {
    async fn persist(&self, document_id: Uuid, content: String) -> Result<(), ClientError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Pending,
    Saving,
    Saved,
    Failed(String),
}

impl SaveStatus {
    /// Short text for display next to the editor.
    pub fn message(&self) -> String {
        match self {
            SaveStatus::Idle => String::new(),
            SaveStatus::Pending => "Unsaved changes".to_string(),
            SaveStatus::Saving => "Saving...".to_string(),
            SaveStatus::Saved => "All changes saved".to_string(),
            SaveStatus::Failed(reason) => format!("Save failed: {reason}"),
        }
    }
}

pub struct Autosaver<S: DocumentSink> {
    document_id: Uuid,
    window: Duration,
    sink: Arc<S>,
    buffer: Arc<Mutex<String>>,
    status: Arc<watch::Sender<SaveStatus>>,
    generation: Arc<AtomicU64>,
    pending: Option<CancellationToken>,
}

impl<S: DocumentSink> Autosaver<S> {
    pub fn new(document_id: Uuid, initial_content: impl Into<String>, sink: Arc<S>) -> Self {
        Self::with_window(document_id, initial_content, sink, DEFAULT_WINDOW)
    }

    pub fn with_window(
        document_id: Uuid,
        initial_content: impl Into<String>,
        sink: Arc<S>,
        window: Duration,
    ) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            document_id,
            window,
            sink,
            buffer: Arc::new(Mutex::new(initial_content.into())),
            status: Arc::new(status),
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    /// Records an edit and (re)starts the quiet window. Must run inside a
    /// tokio runtime.
    pub fn edit(&mut self, content: impl Into<String>) {
        let content = content.into();
        *self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = content.clone();

        if let Some(previous) = self.pending.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        self.pending = Some(cancel.clone());

        // Bumped under the channel lock so a finishing save can't slip its
        // status in between the bump and `Pending`.
        let mut generation = 0;
        self.status.send_modify(|status| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *status = SaveStatus::Pending;
        });

        let document_id = self.document_id;
        let window = self.window;
        let sink = Arc::clone(&self.sink);
        let status = Arc::clone(&self.status);
        let latest = Arc::clone(&self.generation);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(window) => {
                    report(&status, &latest, generation, SaveStatus::Saving);
                    match sink.persist(document_id, content).await {
                        Ok(()) => {
                            report(&status, &latest, generation, SaveStatus::Saved);
                        }
                        Err(err) => {
                            tracing::warn!(%document_id, %err, "autosave failed");
                            let failed = SaveStatus::Failed(err.to_string());
                            report(&status, &latest, generation, failed);
                        }
                    }
                }
            }
        });
    }

    /// The latest edit, persisted or not.
    pub fn content(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }
}

/// Publishes `next` only if no edit has happened since `generation` started.
fn report(
    status: &watch::Sender<SaveStatus>,
    latest: &AtomicU64,
    generation: u64,
    next: SaveStatus,
) {
    status.send_if_modified(|current| {
        if latest.load(Ordering::SeqCst) != generation {
            return false;
        }
        *current = next;
        true
    });
}

impl<S: DocumentSink> Drop for Autosaver<S> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}
