//! The chunk → embed → publish cycle for a single document.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    chunking::{ChunkingConfig, chunk_text},
    embedder::{Embedder, EmbeddingKind},
    error::{Error, Result},
    store::{Chunk, ChunkStore},
};

/// What became of a reindex attempt that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexOutcome {
    /// The chunk list was installed; carries the number of chunks.
    Published(usize),
    /// A newer reindex (or a removal) overtook this attempt; its result was
    /// discarded and the store was left untouched.
    Superseded,
}

/// Orchestrates reindexing with per-document serialization.
///
/// Reindexes of the same document queue behind a per-document mutex;
/// different documents run fully in parallel. Each request takes its store
/// ticket *before* waiting on the lock, so whichever request arrived last
/// wins even if the attempts complete out of order.
pub struct Reindexer {
    store: Arc<ChunkStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    timeout: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Reindexer {
    pub fn new(
        store: Arc<ChunkStore>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkingConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking,
            timeout,
            locks: DashMap::new(),
        }
    }

    /// Rebuild and publish the chunk list for `document` from `text`.
    ///
    /// All-or-nothing: an embedding failure (including timeout) aborts the
    /// attempt before anything is published, and the document's previous
    /// list (if any) stays visible. Zero chunks is not a failure;
    /// it publishes an empty list, the valid state of a cleared document.
    pub async fn reindex(
        &self,
        document: &str,
        text: &str,
    ) -> Result<ReindexOutcome> {
        let generation = self.store.begin(document);
        let lock = self.document_lock(document);
        let _guard = lock.lock().await;

        let texts = chunk_text(text, &self.chunking);
        if texts.is_empty() {
            return Ok(if self.store.publish(document, generation, Vec::new()) {
                tracing::info!(document, "indexed empty document");
                ReindexOutcome::Published(0)
            } else {
                ReindexOutcome::Superseded
            });
        }

        let embeddings = self.embed_documents(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "gateway returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            )));
        }

        let count = texts.len();
        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(sequence, (text, embedding))| Chunk {
                document: document.to_string(),
                sequence,
                text,
                embedding,
            })
            .collect();

        if self.store.publish(document, generation, chunks) {
            tracing::info!(document, chunks = count, "indexed");
            Ok(ReindexOutcome::Published(count))
        } else {
            tracing::debug!(document, "reindex superseded, result discarded");
            Ok(ReindexOutcome::Superseded)
        }
    }

    /// Drop `document` from the index. Idempotent.
    pub fn remove(&self, document: &str) -> bool {
        let removed = self.store.remove(document);
        if removed {
            tracing::info!(document, "removed from index");
        }
        removed
    }

    fn document_lock(&self, document: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(document.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match tokio::time::timeout(
            self.timeout,
            self.embedder.embed(texts, EmbeddingKind::Document),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::EmbeddingTimeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}
