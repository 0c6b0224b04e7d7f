//! Request types

use serde::{Deserialize, Serialize};

/// Default number of excerpts retrieved per question
pub const DEFAULT_TOP_K: usize = 3;

/// Question request for the ask endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve, `retrieval.default_k` when absent
    #[serde(default)]
    pub k: Option<usize>,
}

impl AskRequest {
    /// Create a new question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            k: None,
        }
    }

    /// Requested k, or `default` when none was given
    pub fn k_or(&self, default: usize) -> usize {
        self.k.unwrap_or(default)
    }

    /// Set the number of results to retrieve
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }
}

/// Upload options, sent as an optional `options` multipart field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Custom chunk size (overrides config)
    pub chunk_size: Option<usize>,

    /// Custom chunk overlap (overrides config)
    pub chunk_overlap: Option<usize>,
}
