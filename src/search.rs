//! Cosine-similarity ranking over a snapshot of the chunk store.

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    embedder::{Embedder, EmbeddingKind},
    error::{Error, Result},
    store::ChunkStore,
};

/// Number of chunks folded into a chat context block.
pub const CONTEXT_TOP_K: usize = 3;

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Id of the document the chunk came from.
    pub document: String,
    /// The chunk text.
    pub text: String,
    /// Cosine similarity against the query, in [-1, 1].
    pub score: f32,
}

/// Rank every indexed chunk against `query` and return the top `top_k`.
///
/// An empty store returns an empty result without calling the embedding
/// gateway at all. Otherwise the query is embedded once, a single consistent
/// snapshot is scored, and results come back sorted by descending score.
/// Equal scores keep snapshot enumeration order: document insertion order,
/// then chunk sequence.
///
/// A gateway failure on the query embedding propagates to the caller; no
/// ranking is possible without a query vector.
pub async fn search(
    store: &ChunkStore,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Result<Vec<SearchHit>> {
    if store.is_empty() {
        return Ok(Vec::new());
    }

    let query_embedding = embedder
        .embed(&[query.to_string()], EmbeddingKind::Query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            Error::Embedding("gateway returned no vector for the query".into())
        })?;

    let snapshot = store.snapshot();
    let chunks: Vec<_> = snapshot
        .iter()
        .flat_map(|(_, chunks)| chunks.iter())
        .collect();

    let mut hits: Vec<SearchHit> = chunks
        .par_iter()
        .map(|chunk| SearchHit {
            document: chunk.document.clone(),
            text: chunk.text.clone(),
            score: cosine_similarity(&query_embedding, &chunk.embedding),
        })
        .collect();

    // Stable sort: ties keep their snapshot position.
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    Ok(hits)
}

/// Build the numbered citation block handed to the chat pipeline.
///
/// Returns `None` when nothing is indexed. The format (`[i] From <doc>:`
/// followed by the chunk text, entries separated by blank lines) is relied
/// on by downstream prompts for citation style.
pub async fn build_context(
    store: &ChunkStore,
    embedder: &dyn Embedder,
    query: &str,
) -> Result<Option<String>> {
    let hits = search(store, embedder, query, CONTEXT_TOP_K).await?;
    if hits.is_empty() {
        return Ok(None);
    }

    Ok(Some(
        hits.iter()
            .enumerate()
            .map(|(i, hit)| format!("[{}] From {}:\n{}", i + 1, hit.document, hit.text))
            .collect::<Vec<_>>()
            .join("\n\n"),
    ))
}

/// Cosine similarity, with zero-norm vectors scoring 0.0 instead of NaN so
/// ranking stays total.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Render results for human-readable terminal output.
pub fn format_human(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{:>3}. [{:.3}] {}", i + 1, hit.score, hit.document);
        for line in hit.text.lines().take(3) {
            println!("     {line}");
        }
    }
    println!("\n{} result(s)", hits.len());
}

/// Render results as a JSON document on stdout.
pub fn format_json(hits: &[SearchHit], query: &str) -> Result<()> {
    #[derive(Serialize)]
    struct Output<'a> {
        query: &'a str,
        result_count: usize,
        results: &'a [SearchHit],
    }

    let rendered = serde_json::to_string_pretty(&Output {
        query,
        result_count: hits.len(),
        results: hits,
    })
    .map_err(|e| Error::Config(format!("failed to serialize results: {e}")))?;
    println!("{rendered}");
    Ok(())
}
