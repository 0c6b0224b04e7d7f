//! Document ingestion: text extraction, chunking and the commit pipeline

mod chunker;
mod extract;
mod pipeline;

pub use chunker::{TextChunker, TextWindow};
pub use extract::{FileExtractor, TextExtractor};
pub use pipeline::{IngestPipeline, IngestReport, IngestStage};
