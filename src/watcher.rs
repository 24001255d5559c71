//! Filesystem change source feeding the engine's event channel.
//!
//! The engine only ever consumes [`DocChange`] values; this module is the
//! adapter that turns raw `notify` events into them. Modifications are
//! debounced over a quiet window so an editor writing a file in several
//! syscalls triggers one reindex, not five. Removals flush immediately.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::walker::is_indexable;

/// Capacity of the change-event channel between watcher and engine.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Quiet window a modified file must hold before it is forwarded.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// How often pending debounced entries are checked for readiness.
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to a document in the source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

/// One change notification for one document.
#[derive(Debug, Clone)]
pub struct DocChange {
    /// Document id: path relative to the watched root.
    pub document: String,
    pub kind: ChangeKind,
}

/// Coalesces bursts of events per document until a quiet window passes.
#[derive(Default)]
struct Debouncer {
    pending: HashMap<String, (ChangeKind, Instant)>,
}

impl Debouncer {
    /// Note an add/change event. An earlier `Added` is not downgraded by the
    /// writes that follow file creation.
    fn record(&mut self, document: String, kind: ChangeKind) {
        let now = Instant::now();
        self.pending
            .entry(document)
            .and_modify(|(_, last_seen)| *last_seen = now)
            .or_insert((kind, now));
    }

    /// Forget any pending entry (the document was removed).
    fn discard(&mut self, document: &str) {
        self.pending.remove(document);
    }

    /// Drain entries that have been quiet for the full window.
    fn take_ready(&mut self, window: Duration) -> Vec<(String, ChangeKind)> {
        let now = Instant::now();
        let ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, (_, last_seen))| now.duration_since(*last_seen) >= window)
            .map(|(document, _)| document.clone())
            .collect();

        let mut drained: Vec<(String, ChangeKind)> = ready
            .into_iter()
            .filter_map(|document| {
                self.pending
                    .remove(&document)
                    .map(|(kind, _)| (document, kind))
            })
            .collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
    }
}

/// Watches a document root and emits [`DocChange`] messages.
pub struct DocWatcher {
    root: PathBuf,
    raw_rx: mpsc::Receiver<notify::Result<Event>>,
    sender: mpsc::Sender<DocChange>,
    debouncer: Debouncer,
    // Dropping the watcher stops the OS subscription.
    _watcher: RecommendedWatcher,
}

impl DocWatcher {
    /// Register an OS watch on `root`, forwarding changes to `sender`.
    pub fn new(root: &Path, sender: mpsc::Sender<DocChange>) -> Result<Self> {
        let root = root.canonicalize()?;
        let (raw_tx, raw_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        // The callback runs on notify's own thread, so a blocking send is
        // the right bridge into the async channel.
        let mut watcher =
            notify::recommended_watcher(move |event: notify::Result<Event>| {
                let _ = raw_tx.blocking_send(event);
            })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        tracing::info!(root = %root.display(), "watching for document changes");

        Ok(Self {
            root,
            raw_rx,
            sender,
            debouncer: Debouncer::default(),
            _watcher: watcher,
        })
    }

    /// Event loop. Runs until the raw event stream or the consumer closes.
    pub async fn run(mut self) {
        loop {
            let flush = tokio::time::sleep(FLUSH_INTERVAL);
            tokio::pin!(flush);

            tokio::select! {
                maybe = self.raw_rx.recv() => {
                    match maybe {
                        Some(Ok(event)) => self.handle_event(event).await,
                        Some(Err(e)) => {
                            tracing::error!("file watch error: {e}");
                        }
                        None => break,
                    }
                }
                _ = &mut flush => {
                    let ready = self.debouncer.take_ready(DEBOUNCE_WINDOW);
                    for (document, kind) in ready {
                        // A file can vanish between the event and the flush;
                        // report what is true now.
                        let kind = if self.root.join(&document).exists() {
                            kind
                        } else {
                            ChangeKind::Removed
                        };
                        self.forward(document, kind).await;
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        for path in &event.paths {
            if !is_indexable(path) {
                continue;
            }
            let Some(document) = self.document_id(path) else {
                continue;
            };

            match event.kind {
                EventKind::Create(_) => {
                    self.debouncer.record(document, ChangeKind::Added);
                }
                EventKind::Modify(_) => {
                    self.debouncer.record(document, ChangeKind::Changed);
                }
                EventKind::Remove(_) => {
                    self.debouncer.discard(&document);
                    self.forward(document, ChangeKind::Removed).await;
                }
                _ => {}
            }
        }
    }

    async fn forward(&self, document: String, kind: ChangeKind) {
        tracing::debug!(document = %document, ?kind, "document change");
        if self
            .sender
            .send(DocChange { document, kind })
            .await
            .is_err()
        {
            tracing::warn!("change consumer is gone, dropping event");
        }
    }

    fn document_id(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|relative| relative.to_string_lossy().to_string())
    }
}
