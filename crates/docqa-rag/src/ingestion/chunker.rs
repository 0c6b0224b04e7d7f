//! Fixed-size overlapping text windows

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// One window of chunked text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow<'a> {
    /// Window text, cut on char boundaries
    pub text: &'a str,
    /// Ordinal within the document
    pub position: u32,
    /// Offset of the first char, in chars
    pub char_start: usize,
    /// Offset one past the last char, in chars
    pub char_end: usize,
}

/// Text chunker with configurable size and overlap.
///
/// Sizes are counted in Unicode scalar values. Window `i` starts at char
/// `i * (chunk_size - overlap)` and the sequence ends with the first window
/// that reaches the end of the text, so consecutive windows share exactly
/// `overlap` chars and only the last one may be shorter.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid("chunk_size must be > 0"));
        }
        if overlap >= chunk_size {
            return Err(Error::invalid(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Number of windows `chunk` produces for a text of `char_count` chars
    pub fn expected_count(&self, char_count: usize) -> usize {
        if char_count == 0 {
            0
        } else if char_count <= self.overlap {
            1
        } else {
            let step = self.chunk_size - self.overlap;
            (char_count - self.overlap).div_ceil(step)
        }
    }

    /// Split text into ordered windows
    pub fn chunk<'a>(&self, text: &'a str) -> Vec<TextWindow<'a>> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char, plus the end of the text
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let char_count = offsets.len();
        offsets.push(text.len());

        let step = self.chunk_size - self.overlap;
        let mut windows = Vec::with_capacity(self.expected_count(char_count));
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(char_count);
            windows.push(TextWindow {
                text: &text[offsets[start]..offsets[end]],
                position: windows.len() as u32,
                char_start: start,
                char_end: end,
            });

            if end == char_count {
                break;
            }
            start += step;
        }

        windows
    }
}
