//! Sliding-window text chunker.
//!
//! Splits document text into overlapping fixed-size windows measured in
//! characters (not bytes, so multi-byte UTF-8 text never splits inside a
//! code point).
//!
//! # Algorithm
//!
//! 1. Normalize line endings: `\r\n` and lone `\r` become `\n`.
//! 2. Start a window at character 0 covering `[start, min(start + size, len))`.
//! 3. Trim surrounding whitespace from the window; keep it if non-empty.
//! 4. Stop once a window reaches the end of the text, otherwise advance
//!    `start` to `end - overlap` (always strictly forward since
//!    `overlap < size`).
//!
//! For a text of `L` characters with `L > size` this yields
//! `ceil((L - overlap) / (size - overlap))` windows before trimming.
//!
//! # Example
//!
//! ```rust
//! use docrag::chunk::{chunk_text, ChunkParams};
//!
//! let params = ChunkParams::new(10, 2).unwrap();
//! let chunks = chunk_text("abcdefghijklmnop", &params);
//! assert_eq!(chunks, vec!["abcdefghij", "ijklmnop"]);
//! ```

use serde::Deserialize;

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1200;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Validated chunking parameters.
///
/// Construct with [`ChunkParams::new`]; the fields cannot hold an
/// `overlap >= size` combination once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawChunkParams")]
pub struct ChunkParams {
    size: usize,
    overlap: usize,
}

#[derive(Deserialize)]
struct RawChunkParams {
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
    #[serde(default = "default_overlap")]
    overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

impl TryFrom<RawChunkParams> for ChunkParams {
    type Error = RagError;

    fn try_from(raw: RawChunkParams) -> Result<Self> {
        ChunkParams::new(raw.chunk_size, raw.overlap)
    }
}

impl ChunkParams {
    /// Validate and build chunking parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `size == 0` or `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".to_string()));
        }
        if overlap >= size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be less than chunk_size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Replace `\r\n` and lone `\r` with `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split `text` into trimmed, non-empty, overlapping windows.
///
/// Output order equals left-to-right position in the source text, and is
/// byte-for-byte identical across calls with the same input.
pub fn chunk_text(text: &str, params: &ChunkParams) -> Vec<String> {
    let text = normalize_line_endings(text);

    // Byte offset of every char, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let len = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < len {
        let end = (start + params.size).min(len);
        let window = text[bounds[start]..bounds[end]].trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end >= len {
            break;
        }
        start = (end - params.overlap).max(start + 1);
    }
    chunks
}

/// Validate `size` / `overlap`, then [`chunk_text`].
///
/// # Errors
///
/// Returns [`RagError::Config`] if `size == 0` or `overlap >= size`.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
    let params = ChunkParams::new(size, overlap)?;
    Ok(chunk_text(text, &params))
}

/// Chunk a document and tag each piece with its source file and index.
pub fn chunk_document(source_file: &str, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    chunk_text(text, params)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            text,
            source_file: source_file.to_string(),
            chunk_index,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Text where every 10-char cell is distinct: `c0000000 \n`-style tokens.
    fn filler(len: usize) -> String {
        let mut s = String::new();
        let mut i = 0;
        while s.len() < len {
            s.push_str(&format!("t{:07}x ", i));
            i += 1;
        }
        s.truncate(len);
        s
    }

    #[test]
    fn test_empty_text() {
        let chunks = chunk_text("", &ChunkParams::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_whitespace_only_text() {
        let chunks = chunk_text("   \n\n\t  \r\n ", &ChunkParams::new(4, 1).unwrap());
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("  Hello, world!  ", &ChunkParams::default());
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_overlap_not_less_than_size_rejected() {
        assert!(matches!(ChunkParams::new(10, 10), Err(RagError::Config(_))));
        assert!(matches!(ChunkParams::new(10, 25), Err(RagError::Config(_))));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(ChunkParams::new(0, 0), Err(RagError::Config(_))));
    }

    #[test]
    fn test_default_window_boundaries() {
        let text = filler(2500);
        let chunks = chunk_text(&text, &ChunkParams::default());
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], text[0..1200].trim());
        assert_eq!(chunks[1], text[1000..2200].trim());
        assert_eq!(chunks[2], text[2000..2500].trim());
    }

    #[test]
    fn test_zero_overlap_partitions_text() {
        let text = "abcdefghij";
        let chunks = chunk_text(text, &ChunkParams::new(3, 0).unwrap());
        assert_eq!(chunks, vec!["abc", "def", "ghi", "j"]);
    }

    #[test]
    fn test_crlf_normalized() {
        let chunks = chunk_text("one\r\ntwo\rthree", &ChunkParams::default());
        assert_eq!(chunks, vec!["one\ntwo\nthree"]);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────┐│héllo wörld│└──────┘";
        let params = ChunkParams::new(5, 2).unwrap();
        let chunks = chunk_text(text, &params);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= 5);
        }
    }

    #[test]
    fn test_windows_that_trim_to_nothing_are_dropped() {
        let text = format!("alpha{}omega", " ".repeat(20));
        let chunks = chunk_text(&text, &ChunkParams::new(8, 0).unwrap());
        assert_eq!(chunks, vec!["alpha", "omega"]);
    }

    #[test]
    fn test_deterministic() {
        let text = filler(5000);
        let params = ChunkParams::new(333, 77).unwrap();
        assert_eq!(chunk_text(&text, &params), chunk_text(&text, &params));
    }

    #[test]
    fn test_chunk_document_indices_contiguous() {
        let text = filler(900);
        let chunks = chunk_document("doc.txt", &text, &ChunkParams::new(100, 10).unwrap());
        assert_eq!(chunks.len(), 10);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.source_file, "doc.txt");
        }
    }

    #[test]
    fn test_params_deserialize_validates() {
        let ok: ChunkParams = toml::from_str("chunk_size = 50\noverlap = 5").unwrap();
        assert_eq!(ok.size(), 50);
        assert_eq!(ok.overlap(), 5);
        let defaulted: ChunkParams = toml::from_str("").unwrap();
        assert_eq!(defaulted, ChunkParams::default());
        let bad: std::result::Result<ChunkParams, _> = toml::from_str("chunk_size = 5\noverlap = 5");
        assert!(bad.is_err());
    }

    #[test]
    fn test_chunk_validates_before_iterating() {
        assert!(matches!(chunk("abc", 0, 0), Err(RagError::Config(_))));
        assert!(matches!(chunk("abc", 3, 3), Err(RagError::Config(_))));
        assert_eq!(chunk("abcdef", 4, 1).unwrap(), vec!["abcd", "def"]);
    }
}
