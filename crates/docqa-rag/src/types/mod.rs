//! Core types for the document Q&A engine

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkId, DocumentSummary, EmbeddedChunk, FileType};
pub use query::AskRequest;
pub use response::{AskResponse, SourceExcerpt};
