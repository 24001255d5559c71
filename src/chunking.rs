//! Splitting document text into overlapping fixed-size windows.
//!
//! Each window is trimmed before it is emitted, and windows that trim down
//! to nothing are dropped entirely. Windowing is measured in characters so
//! multi-byte UTF-8 content never gets sliced mid-codepoint.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default number of characters shared between adjacent chunks.
pub const DEFAULT_OVERLAP: usize = 100;

/// Chunking parameters, validated once at construction.
///
/// The overlap must be positive and strictly smaller than the chunk size;
/// anything else either loses content between windows or never advances the
/// cursor.
///
/// # Examples
///
/// ```
/// use semdex::chunking::ChunkingConfig;
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.chunk_size, 500);
/// assert_eq!(config.overlap, 100);
///
/// assert!(ChunkingConfig::new(500, 500).is_err());
/// assert!(ChunkingConfig::new(500, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub overlap: usize,
}

impl ChunkingConfig {
    /// Build a validated configuration.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the `0 < overlap < chunk_size` invariant.
    pub fn validate(&self) -> Result<()> {
        if self.overlap == 0 || self.overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap must satisfy 0 < overlap < chunk_size \
                 (chunk_size={}, overlap={})",
                self.chunk_size, self.overlap
            )));
        }
        Ok(())
    }

    /// Cursor advance per window.
    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Split `text` into overlapping, trimmed chunks.
///
/// A cursor starts at zero and emits the window
/// `text[cursor .. cursor + chunk_size]` (clamped to the end of the text),
/// then advances by `chunk_size - overlap`. Iteration stops once the cursor
/// reaches the final `overlap` characters, which would only re-emit content
/// already covered by the previous window.
///
/// Deterministic: identical input always produces the identical sequence.
///
/// # Examples
///
/// ```
/// use semdex::chunking::{ChunkingConfig, chunk_text};
///
/// let config = ChunkingConfig::default();
/// assert_eq!(chunk_text("hello world", &config), vec!["hello world"]);
/// assert!(chunk_text("   \n\t  ", &config).is_empty());
/// ```
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    // Char index -> byte index, with a sentinel for the end of the text.
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = char_to_byte.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < char_count {
        let end = (start + config.chunk_size).min(char_count);
        let window = &text[char_to_byte[start]..char_to_byte[end]];

        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        start += config.step();
        if start >= char_count.saturating_sub(config.overlap) {
            break;
        }
    }

    chunks
}
