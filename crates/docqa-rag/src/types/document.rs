//! Chunk and document types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable chunk identifier, assigned by the record store and never reused
pub type ChunkId = u64;

/// Supported upload types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Anything else (rejected at upload)
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename
    pub fn from_filename(filename: &str) -> Self {
        std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Check if this file type is supported for ingestion
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// The atomic indexed unit: text, embedding and source attribution.
///
/// Everything except `id` is fixed when the owning document is committed;
/// chunks are never mutated afterwards, only removed with their document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Store-assigned identifier
    pub id: ChunkId,
    /// Raw chunk text
    pub text: String,
    /// Embedding vector (dimension fixed at startup)
    pub embedding: Vec<f32>,
    /// Name of the owning document
    pub source_document: String,
    /// Ordinal of this chunk within its document
    pub position: u32,
    /// When the owning document was committed
    pub created_at: DateTime<Utc>,
}

/// A chunk that has been embedded but not yet committed to the store
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub position: u32,
}

impl EmbeddedChunk {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>, position: u32) -> Self {
        Self {
            text: text.into(),
            embedding,
            position,
        }
    }
}

/// Per-document view derived from the chunk set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document name as uploaded
    pub filename: String,
    /// Number of live chunks
    pub chunks: usize,
    /// Commit time of the document's chunks
    pub ingested_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_filename("report.PDF"), FileType::Pdf);
        assert_eq!(FileType::from_filename("notes.text"), FileType::Txt);
        assert_eq!(FileType::from_filename("README.md"), FileType::Markdown);
        assert_eq!(FileType::from_filename("archive.zip"), FileType::Unknown);
        assert_eq!(FileType::from_filename("no_extension"), FileType::Unknown);
        assert!(!FileType::Unknown.is_supported());
    }
}
