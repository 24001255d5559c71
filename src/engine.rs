//! The engine handle: lifecycle, event intake, and query surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use globset::GlobSet;
use kdam::{BarExt, tqdm};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::{
    chunking::ChunkingConfig,
    embedder::Embedder,
    error::{Error, Result},
    reindex::{Reindexer, ReindexOutcome},
    search,
    search::SearchHit,
    store::ChunkStore,
    walker,
    watcher::{ChangeKind, DocChange},
};

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    /// Upper bound on any single embedding gateway call.
    pub embed_timeout: Duration,
    /// Optional include filter applied during the startup scan.
    pub include: Option<GlobSet>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embed_timeout: Duration::from_secs(30),
            include: None,
        }
    }
}

/// Outcome of the startup scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexReport {
    /// Documents discovered by the scan.
    pub discovered: usize,
    /// Documents indexed successfully.
    pub indexed: usize,
    /// Documents skipped because reading or embedding failed.
    pub failed: usize,
    /// Total chunks published.
    pub chunks: usize,
}

/// The shared handle over store, embedder, and reindexer.
///
/// Cheap to clone; every clone operates on the same index. Tests construct
/// isolated engines around stub embedders the same way production code
/// constructs one around the HTTP gateway.
#[derive(Clone)]
pub struct Engine {
    store: Arc<ChunkStore>,
    embedder: Arc<dyn Embedder>,
    reindexer: Arc<Reindexer>,
    include: Option<GlobSet>,
}

impl Engine {
    /// Build an engine. Fails fast on invalid chunking parameters.
    pub fn new(embedder: Arc<dyn Embedder>, config: EngineConfig) -> Result<Self> {
        config.chunking.validate()?;

        let store = Arc::new(ChunkStore::new());
        let reindexer = Arc::new(Reindexer::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            config.chunking,
            config.embed_timeout,
        ));

        Ok(Self {
            store,
            embedder,
            reindexer,
            include: config.include,
        })
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Rebuild the index entry for one document from raw text.
    pub async fn reindex(
        &self,
        document: &str,
        text: &str,
    ) -> Result<ReindexOutcome> {
        self.reindexer.reindex(document, text).await
    }

    /// Read a document from disk and reindex it.
    pub async fn reindex_file(
        &self,
        root: &Path,
        document: &str,
    ) -> Result<ReindexOutcome> {
        let path = root.join(document);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| Error::SourceRead { path, source })?;
        self.reindex(document, &text).await
    }

    /// Drop a document from the index. Idempotent.
    pub fn remove(&self, document: &str) -> bool {
        self.reindexer.remove(document)
    }

    /// Scan `root` and index every discovered document.
    ///
    /// Documents index in parallel; a failure in one never aborts the others
    /// (it is logged and counted in the report). The engine is ready for
    /// search traffic when this returns.
    pub async fn initialize(&self, root: &Path) -> Result<IndexReport> {
        let docs = walker::discover_docs(root, self.include.as_ref())?;
        let mut report = IndexReport {
            discovered: docs.len(),
            ..IndexReport::default()
        };

        tracing::info!(root = %root.display(), documents = docs.len(), "indexing");
        let mut bar = tqdm!(total = docs.len(), desc = "indexing");

        let root = root.to_path_buf();
        let mut tasks = JoinSet::new();
        for doc in docs {
            let engine = self.clone();
            let root = root.clone();
            tasks.spawn(async move {
                let outcome = engine.reindex_file(&root, &doc.id).await;
                (doc.id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((document, outcome)) = joined else {
                report.failed += 1;
                continue;
            };
            match outcome {
                Ok(ReindexOutcome::Published(count)) => {
                    report.indexed += 1;
                    report.chunks += count;
                }
                Ok(ReindexOutcome::Superseded) => {
                    // A watcher event got there first; the newer result won.
                    report.indexed += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(document = %document, "failed to index: {e}");
                }
            }
            let _ = bar.update(1);
        }

        tracing::info!(
            indexed = report.indexed,
            failed = report.failed,
            chunks = report.chunks,
            "initial indexing complete"
        );
        Ok(report)
    }

    /// Consume document change events, fanning out one task per event.
    ///
    /// Runs until the sending side closes. Per-document ordering is handled
    /// by the reindexer's serialization and generation tickets, so events
    /// for different documents never wait on each other.
    pub async fn run_events(&self, root: PathBuf, mut events: mpsc::Receiver<DocChange>) {
        while let Some(change) = events.recv().await {
            let engine = self.clone();
            let root = root.clone();
            tokio::spawn(async move {
                engine.apply(&root, change).await;
            });
        }
    }

    async fn apply(&self, root: &Path, change: DocChange) {
        match change.kind {
            ChangeKind::Added | ChangeKind::Changed => {
                if let Err(e) = self.reindex_file(root, &change.document).await {
                    // The previous index entry, if any, stays visible.
                    tracing::warn!(
                        document = %change.document,
                        "reindex failed, keeping last good version: {e}"
                    );
                }
            }
            ChangeKind::Removed => {
                self.remove(&change.document);
            }
        }
    }

    /// Rank indexed chunks against `query`; see [`search::search`].
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        search::search(&self.store, self.embedder.as_ref(), query, top_k).await
    }

    /// Build the top-3 citation block; see [`search::build_context`].
    pub async fn build_context(&self, query: &str) -> Result<Option<String>> {
        search::build_context(&self.store, self.embedder.as_ref(), query).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::embedder::EmbeddingKind;

    /// Deterministic embedder: vector depends only on text length.
    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(
            &self,
            texts: &[String],
            _kind: EmbeddingKind,
        ) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }
    }

    fn engine() -> Engine {
        Engine::new(Arc::new(LengthEmbedder), EngineConfig::default()).unwrap()
    }

    #[test]
    fn construction_rejects_invalid_chunking() {
        let config = EngineConfig {
            chunking: ChunkingConfig {
                chunk_size: 100,
                overlap: 100,
            },
            ..EngineConfig::default()
        };
        assert!(matches!(
            Engine::new(Arc::new(LengthEmbedder), config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn initialize_indexes_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.md"), "alpha document body").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "beta document body").unwrap();
        std::fs::write(tmp.path().join("c.png"), "not indexable").unwrap();

        let engine = engine();
        let report = engine.initialize(tmp.path()).await.unwrap();

        assert_eq!(report.discovered, 2);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(engine.store().document_count(), 2);
    }

    #[tokio::test]
    async fn apply_removed_event_deletes_document() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.md"), "body").unwrap();

        let engine = engine();
        engine.initialize(tmp.path()).await.unwrap();
        assert_eq!(engine.store().document_count(), 1);

        engine
            .apply(
                tmp.path(),
                DocChange {
                    document: "a.md".to_string(),
                    kind: ChangeKind::Removed,
                },
            )
            .await;
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn apply_change_event_for_unreadable_file_keeps_prior_entry() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.md"), "original body").unwrap();

        let engine = engine();
        engine.initialize(tmp.path()).await.unwrap();

        // The file vanishes before the change event is processed.
        std::fs::remove_file(tmp.path().join("a.md")).unwrap();
        engine
            .apply(
                tmp.path(),
                DocChange {
                    document: "a.md".to_string(),
                    kind: ChangeKind::Changed,
                },
            )
            .await;

        // Staleness, not absence, is the failure mode.
        assert_eq!(engine.store().document_count(), 1);
    }
}
