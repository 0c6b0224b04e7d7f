//! Response types for the HTTP surface

use serde::{Deserialize, Serialize};

use super::document::{ChunkId, DocumentSummary};

/// One retrieved excerpt used to answer a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceExcerpt {
    /// Chunk id in the record store
    pub chunk_id: ChunkId,
    /// Owning document name
    pub document: String,
    /// Position of the chunk within its document
    pub position: u32,
    /// Distance to the question embedding (lower is closer)
    pub distance: f32,
    /// Verbatim chunk text
    pub text: String,
}

/// Answer to a question, with excerpts in ranked order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// Generated answer
    pub answer: String,
    /// Verbatim excerpts used for the answer, nearest first
    pub sources: Vec<String>,
    /// Source details in the same order as `sources`
    pub source_details: Vec<SourceExcerpt>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl AskResponse {
    /// Create a response from the generated answer and the excerpts used
    pub fn new(answer: String, excerpts: Vec<SourceExcerpt>, processing_time_ms: u64) -> Self {
        Self {
            answer,
            sources: excerpts.iter().map(|e| e.text.clone()).collect(),
            source_details: excerpts,
            processing_time_ms,
        }
    }
}

/// Response from the upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    /// Chunks created for this document
    pub chunks: usize,
    /// Chunks retired because the document was uploaded before
    pub replaced_chunks: usize,
    /// Live chunks across all documents after the commit
    pub total_chunks: usize,
    pub embedding_model: String,
    pub processing_time_ms: u64,
}

/// Response from the file listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<DocumentSummary>,
    pub total_files: usize,
    pub total_chunks: usize,
}

/// Response from the delete endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub filename: String,
    pub chunks_deleted: usize,
    pub remaining_chunks: usize,
}

/// Response from the clear endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
    pub files_deleted: usize,
    pub chunks_cleared: usize,
}

/// Response from the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    /// Live chunk count
    pub documents_in_db: usize,
    pub files: usize,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub llm: String,
    pub delete_policy: String,
    /// Deleted ids still filtered out of searches (tombstone policy only)
    pub pending_tombstones: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_follow_excerpt_order() {
        let excerpts = vec![
            SourceExcerpt {
                chunk_id: 4,
                document: "a.txt".into(),
                position: 1,
                distance: 0.1,
                text: "nearest".into(),
            },
            SourceExcerpt {
                chunk_id: 2,
                document: "a.txt".into(),
                position: 0,
                distance: 0.7,
                text: "farther".into(),
            },
        ];

        let response = AskResponse::new("answer".into(), excerpts, 12);
        assert_eq!(response.sources, vec!["nearest", "farther"]);
        assert_eq!(response.source_details[0].chunk_id, 4);
    }
}
