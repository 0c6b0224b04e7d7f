//! Error types for the document Q&A engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::ChunkId;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied parameters that can never succeed
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Document produced no chunks
    #[error("Document '{0}' is empty: no text could be chunked")]
    EmptyDocument(String),

    /// Query against a store with zero live chunks
    #[error("No documents uploaded yet. Please upload a document first.")]
    EmptyIndex,

    /// Document name has no live chunks
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Chunk id was deleted or never existed
    #[error("Chunk not found: {0}")]
    ChunkNotFound(ChunkId),

    /// Embedding backend failed or timed out
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Answer generation backend failed or timed out
    #[error("Answer generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Index and store disagree. Logged and skipped at read time, never returned.
    #[error("Index inconsistency: {0}")]
    IndexInconsistency(String),

    /// Persisted store failed its integrity check
    #[error("Storage corruption in {path}: {message}")]
    StorageCorruption { path: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid parameters error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationUnavailable(message.into())
    }

    /// Create a storage corruption error
    pub fn corruption(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Self::StorageCorruption {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// External capability failures are worth retrying by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable(_) | Error::GenerationUnavailable(_)
        )
    }

    /// Stable machine-readable error type
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidParameters(_) => "invalid_parameters",
            Error::EmptyDocument(_) => "empty_document",
            Error::EmptyIndex => "empty_index",
            Error::DocumentNotFound(_) | Error::ChunkNotFound(_) => "not_found",
            Error::EmbeddingUnavailable(_) => "embedding_unavailable",
            Error::GenerationUnavailable(_) => "generation_unavailable",
            Error::IndexInconsistency(_) => "index_inconsistency",
            Error::StorageCorruption { .. } => "storage_corruption",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::InvalidParameters(_)
            | Error::EmptyDocument(_)
            | Error::EmptyIndex
            | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::DocumentNotFound(_) | Error::ChunkNotFound(_) => StatusCode::NOT_FOUND,
            Error::EmbeddingUnavailable(_) | Error::GenerationUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::IndexInconsistency(_)
            | Error::StorageCorruption { .. }
            | Error::Config(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}
