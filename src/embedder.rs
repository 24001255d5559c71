//! The embedding gateway seam.
//!
//! The engine never talks to a model directly; everything goes through the
//! [`Embedder`] trait. [`HttpEmbedder`] is the production implementation,
//! speaking the OpenAI-compatible `POST /embeddings` JSON shape that local
//! gateways (Ollama, llama.cpp, vLLM) and hosted APIs share.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Whether a text is being embedded as a search query or as indexed content.
///
/// Instruction-tuned embedding models score asymmetrically: the query and the
/// document each get their own prompt prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingKind {
    Query,
    Document,
}

impl EmbeddingKind {
    /// Instruction prefix prepended to the raw text before embedding.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Query => "task: search result | query: ",
            Self::Document => "title: none | text: ",
        }
    }
}

/// A source of dense text embeddings.
///
/// Implementations return one vector per input text, in input order, with a
/// dimensionality that stays fixed for the lifetime of the process. Failures
/// are ordinary `Err` values; callers must never assume a call succeeds.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(
        &self,
        texts: &[String],
        kind: EmbeddingKind,
    ) -> Result<Vec<Vec<f32>>>;
}

/// HTTP client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Build a client for `base_url` (e.g. `http://localhost:11434/v1`).
    ///
    /// The timeout bounds every gateway call; an elapsed call surfaces as
    /// [`Error::EmbeddingTimeout`] and aborts only the reindex attempt it
    /// belongs to.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::Config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        kind: EmbeddingKind,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let input: Vec<String> = texts
            .iter()
            .map(|t| format!("{}{t}", kind.prefix()))
            .collect();

        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            model: &self.model,
            input,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::EmbeddingTimeout {
                    seconds: self.timeout_secs,
                }
            } else {
                Error::Embedding(e.to_string())
            }
        })?;

        let response = response
            .error_for_status()
            .map_err(|e| Error::Embedding(e.to_string()))?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("malformed response: {e}")))?;

        if body.data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} vectors, gateway returned {}",
                texts.len(),
                body.data.len()
            )));
        }

        // The wire format carries an index per row; order by it rather than
        // trusting response order.
        let mut rows = body.data;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }
}
