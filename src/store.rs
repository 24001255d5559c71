//! The in-memory chunk index.
//!
//! Every document maps to one immutable, fully-built chunk list. Updates
//! replace the whole list in a single step behind a narrow lock, so a reader
//! taking a snapshot sees each document either entirely before or entirely
//! after an update, never a partially written list.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;

/// One embedded chunk of a document.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// Owning document id (its path relative to the document root).
    pub document: String,
    /// Position within the owning document; meaningless across documents.
    pub sequence: usize,
    /// The trimmed chunk text.
    pub text: String,
    /// Dense vector for this chunk.
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// A per-document reindex ticket.
///
/// Tickets for one document are strictly increasing in the order requests
/// arrive. Publication admits a result only if no later ticket exists, so a
/// slow, superseded reindex can never overwrite a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

#[derive(Default)]
struct Inner {
    /// Insertion-ordered so snapshot enumeration (and therefore ranking
    /// tie-breaks) stays stable across searches.
    documents: IndexMap<String, Arc<[Chunk]>>,
    /// Latest ticket issued per document, including tickets consumed by
    /// removals.
    latest: HashMap<String, u64>,
}

/// Process-wide mapping from document id to its published chunk list.
///
/// The store is the only shared mutable state in the engine. Writers hand it
/// complete replacement lists; readers get consistent snapshots and never
/// wait on an in-flight reindex.
#[derive(Default)]
pub struct ChunkStore {
    inner: RwLock<Inner>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a ticket for an upcoming reindex or removal of `document`.
    pub fn begin(&self, document: &str) -> Generation {
        let mut inner = self.inner.write();
        let counter = inner.latest.entry(document.to_string()).or_insert(0);
        *counter += 1;
        Generation(*counter)
    }

    /// Install a fully-built chunk list for `document`.
    ///
    /// Returns `false` (and discards `chunks`) when a later ticket has been
    /// issued for this document in the meantime: the caller's result is
    /// stale and must not become visible.
    pub fn publish(
        &self,
        document: &str,
        generation: Generation,
        chunks: Vec<Chunk>,
    ) -> bool {
        let mut inner = self.inner.write();
        let latest = inner.latest.get(document).copied().unwrap_or(0);
        if generation.0 < latest {
            return false;
        }
        inner.documents.insert(document.to_string(), chunks.into());
        true
    }

    /// Delete `document` from the index. Idempotent.
    ///
    /// Consumes a ticket so that a reindex already in flight for this
    /// document cannot resurrect it afterwards.
    pub fn remove(&self, document: &str) -> bool {
        let mut inner = self.inner.write();
        if let Some(counter) = inner.latest.get_mut(document) {
            *counter += 1;
        }
        inner.documents.shift_remove(document).is_some()
    }

    /// Consistent point-in-time view of every published chunk list, in
    /// document insertion order.
    pub fn snapshot(&self) -> Vec<(String, Arc<[Chunk]>)> {
        let inner = self.inner.read();
        inner
            .documents
            .iter()
            .map(|(id, chunks)| (id.clone(), Arc::clone(chunks)))
            .collect()
    }

    /// The published chunk list for one document, if present.
    pub fn get(&self, document: &str) -> Option<Arc<[Chunk]>> {
        self.inner.read().documents.get(document).map(Arc::clone)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().documents.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.inner
            .read()
            .documents
            .values()
            .map(|chunks| chunks.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(document: &str, sequence: usize, text: &str) -> Chunk {
        Chunk {
            document: document.to_string(),
            sequence,
            text: text.to_string(),
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn publish_then_snapshot() {
        let store = ChunkStore::new();
        let generation = store.begin("a.md");
        assert!(store.publish("a.md", generation, vec![chunk("a.md", 0, "x")]));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "a.md");
        assert_eq!(snapshot[0].1.len(), 1);
        assert_eq!(store.chunk_count(), 1);
    }

    #[test]
    fn stale_generation_is_discarded() {
        let store = ChunkStore::new();
        let first = store.begin("a.md");
        let second = store.begin("a.md");

        // The newer request completes first.
        assert!(store.publish("a.md", second, vec![chunk("a.md", 0, "new")]));
        // The older one must not clobber it.
        assert!(!store.publish("a.md", first, vec![chunk("a.md", 0, "old")]));

        let chunks = store.get("a.md").unwrap();
        assert_eq!(chunks[0].text, "new");
    }

    #[test]
    fn remove_is_idempotent() {
        let store = ChunkStore::new();
        let generation = store.begin("a.md");
        store.publish("a.md", generation, vec![chunk("a.md", 0, "x")]);

        assert!(store.remove("a.md"));
        assert!(!store.remove("a.md"));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_blocks_in_flight_publication() {
        let store = ChunkStore::new();
        let generation = store.begin("a.md");
        store.remove("a.md");

        // The reindex that was running when the removal arrived finishes
        // late; its result must not bring the document back.
        assert!(!store.publish("a.md", generation, vec![chunk("a.md", 0, "x")]));
        assert!(store.is_empty());
    }

    #[test]
    fn empty_list_is_a_valid_published_state() {
        let store = ChunkStore::new();
        let generation = store.begin("a.md");
        assert!(store.publish("a.md", generation, Vec::new()));

        assert_eq!(store.document_count(), 1);
        assert_eq!(store.chunk_count(), 0);
        assert!(store.get("a.md").unwrap().is_empty());
    }

    #[test]
    fn snapshot_preserves_insertion_order_across_republish() {
        let store = ChunkStore::new();
        for id in ["b.md", "a.md", "c.md"] {
            let generation = store.begin(id);
            store.publish(id, generation, vec![chunk(id, 0, id)]);
        }

        // Republishing an existing document keeps its original position.
        let generation = store.begin("b.md");
        store.publish("b.md", generation, vec![chunk("b.md", 0, "updated")]);

        let order: Vec<String> =
            store.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["b.md", "a.md", "c.md"]);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let store = ChunkStore::new();
        let generation = store.begin("a.md");
        store.publish("a.md", generation, vec![chunk("a.md", 0, "before")]);

        let snapshot = store.snapshot();

        let generation = store.begin("a.md");
        store.publish("a.md", generation, vec![chunk("a.md", 0, "after")]);

        assert_eq!(snapshot[0].1[0].text, "before");
        assert_eq!(store.get("a.md").unwrap()[0].text, "after");
    }
}
