//! semdex - an in-memory semantic indexing and retrieval engine.
//!
//! semdex turns a directory of markdown and text documents into overlapping
//! text chunks with vector embeddings, keeps that index consistent as files
//! are added, changed, and removed, and answers top-k nearest-neighbor
//! queries by cosine similarity. The index lives for the process lifetime
//! only; embeddings come from an external gateway behind the [`Embedder`]
//! trait.
//!
//! # Quick start
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use semdex::{Engine, EngineConfig, HttpEmbedder};
//!
//! # async fn run() -> semdex::Result<()> {
//! let embedder = Arc::new(HttpEmbedder::new(
//!     "http://localhost:11434/v1",
//!     "embeddinggemma",
//!     None,
//!     Duration::from_secs(30),
//! )?);
//!
//! let engine = Engine::new(embedder, EngineConfig::default())?;
//! engine.initialize("./pages".as_ref()).await?;
//!
//! for hit in engine.search("how do I share a bundle", 5).await? {
//!     println!("{:.3} {}: {}", hit.score, hit.document, hit.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod cli;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod reindex;
pub mod search;
pub mod store;
pub mod walker;
pub mod watcher;

pub use chunking::ChunkingConfig;
pub use embedder::{Embedder, EmbeddingKind, HttpEmbedder};
pub use engine::{Engine, EngineConfig, IndexReport};
pub use error::{Error, Result};
pub use reindex::ReindexOutcome;
pub use search::SearchHit;
pub use store::{Chunk, ChunkStore};
