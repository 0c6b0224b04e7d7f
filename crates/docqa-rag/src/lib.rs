//! docqa-rag: document question answering over a local chunk store
//!
//! Uploaded documents are split into overlapping character windows, embedded,
//! and committed to a persistent record store with an exact similarity index
//! beside it. Questions are answered from the nearest chunks by a pluggable
//! generation backend, and every answer carries the excerpts it was built on.

pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{IngestPipeline, IngestReport, TextChunker};
pub use retrieval::Retriever;
pub use storage::{DocumentIndex, RecordStore};
pub use types::{AskRequest, AskResponse, Chunk, ChunkId, DocumentSummary, SourceExcerpt};
