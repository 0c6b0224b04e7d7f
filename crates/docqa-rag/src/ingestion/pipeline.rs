//! Per-document ingestion: chunk, embed, commit

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use super::chunker::TextChunker;
use super::extract::{FileExtractor, TextExtractor};
use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::storage::{ClearOutcome, DocumentIndex};
use crate::types::query::IngestOptions;
use crate::types::EmbeddedChunk;

/// Where a document is in its ingestion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Received,
    Chunked,
    Embedded,
    Indexed,
    Committed,
    Failed,
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document: String,
    /// Chunks created for this document
    pub chunks: usize,
    /// Chunks of an earlier upload with the same name that were replaced
    pub replaced_chunks: usize,
    /// Live chunks across all documents after the commit
    pub total_chunks: usize,
    pub stage: IngestStage,
    pub elapsed_ms: u64,
}

/// Tracks one document through the stages, logging each transition
struct StageTracker<'a> {
    document: &'a str,
    stage: IngestStage,
}

impl<'a> StageTracker<'a> {
    fn new(document: &'a str) -> Self {
        tracing::debug!("[{}] stage: received", document);
        Self {
            document,
            stage: IngestStage::Received,
        }
    }

    fn advance(&mut self, next: IngestStage) {
        tracing::debug!("[{}] stage: {:?} -> {:?}", self.document, self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, error: Error) -> Error {
        tracing::error!(
            "[{}] ingestion failed at {:?}: {}",
            self.document,
            self.stage,
            error
        );
        self.stage = IngestStage::Failed;
        error
    }
}

/// Ingestion pipeline for uploaded documents.
///
/// Extraction and embedding run outside every lock; the store commit and
/// index update run together on a blocking thread. Dropping an ingest future
/// before the commit leaves nothing behind, and a commit that has started
/// always finishes.
pub struct IngestPipeline {
    index: Arc<DocumentIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn TextExtractor>,
    chunker: TextChunker,
    batch_size: usize,
    extract_timeout: Duration,
    embed_timeout: Duration,
}

impl IngestPipeline {
    pub fn new(
        index: Arc<DocumentIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
    ) -> Result<Self> {
        Ok(Self {
            index,
            embedder,
            extractor: Arc::new(FileExtractor),
            chunker: TextChunker::from_config(&config.chunking)?,
            batch_size: config.embeddings.batch_size.max(1),
            extract_timeout: config.processing.extract_timeout(),
            embed_timeout: config.processing.embed_timeout(),
        })
    }

    /// Replace the text extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Extract text from an uploaded file and ingest it under its file name
    pub async fn ingest_file(
        &self,
        filename: &str,
        data: Vec<u8>,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        let chunker = self.chunker_for(options)?;
        let extractor = Arc::clone(&self.extractor);
        let name = filename.to_string();

        tracing::info!("[{}] extracting text from {} bytes", filename, data.len());
        let extraction = tokio::task::spawn_blocking(move || extractor.extract(&name, &data));
        let text = match timeout(self.extract_timeout, extraction).await {
            Ok(joined) => joined.map_err(|e| Error::internal(format!("extraction task failed: {}", e)))??,
            Err(_) => {
                return Err(Error::invalid(format!(
                    "text extraction for {} took longer than {}s",
                    filename,
                    self.extract_timeout.as_secs()
                )))
            }
        };

        self.ingest_with(filename, &text, &chunker).await
    }

    /// Ingest already-extracted text
    pub async fn ingest_text(&self, document: &str, text: &str) -> Result<IngestReport> {
        self.ingest_with(document, text, &self.chunker).await
    }

    async fn ingest_with(
        &self,
        document: &str,
        text: &str,
        chunker: &TextChunker,
    ) -> Result<IngestReport> {
        let started = Instant::now();
        let document = document.trim();
        if document.is_empty() {
            return Err(Error::invalid("document name must not be empty"));
        }

        let mut tracker = StageTracker::new(document);

        // Received -> Chunked
        let windows = chunker.chunk(text.trim());
        if windows.is_empty() {
            return Err(tracker.fail(Error::EmptyDocument(document.to_string())));
        }
        let texts: Vec<String> = windows.iter().map(|w| w.text.to_string()).collect();
        tracker.advance(IngestStage::Chunked);
        tracing::info!("[{}] {} chunks", document, texts.len());

        // Chunked -> Embedded
        let embeddings = match timeout(self.embed_timeout, self.embed_all(&texts)).await {
            Ok(Ok(embeddings)) => embeddings,
            Ok(Err(e)) => {
                let e = match e {
                    Error::EmbeddingUnavailable(_) => e,
                    other => Error::embedding(other.to_string()),
                };
                return Err(tracker.fail(e));
            }
            Err(_) => {
                return Err(tracker.fail(Error::embedding(format!(
                    "embedding {} chunks took longer than {}s",
                    texts.len(),
                    self.embed_timeout.as_secs()
                ))))
            }
        };

        let dimensions = self.index.dimensions();
        if embeddings.len() != texts.len() {
            return Err(tracker.fail(Error::embedding(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                texts.len()
            ))));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(tracker.fail(Error::embedding(format!(
                "embedder returned {} dimensions, expected {}",
                bad.len(),
                dimensions
            ))));
        }

        let embedded: Vec<EmbeddedChunk> = texts
            .into_iter()
            .zip(embeddings)
            .zip(windows.iter().map(|w| w.position))
            .map(|((text, embedding), position)| EmbeddedChunk::new(text, embedding, position))
            .collect();
        tracker.advance(IngestStage::Embedded);

        // Embedded -> Indexed -> Committed, one exclusive section
        let index = Arc::clone(&self.index);
        let name = document.to_string();
        let outcome = tokio::task::spawn_blocking(move || index.commit_document(&name, embedded))
            .await
            .map_err(|e| Error::internal(format!("commit task failed: {}", e)))
            .and_then(|result| result);
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.advance(IngestStage::Indexed);
        tracker.advance(IngestStage::Committed);

        let report = IngestReport {
            document: document.to_string(),
            chunks: outcome.ids.len(),
            replaced_chunks: outcome.replaced,
            total_chunks: outcome.total_chunks,
            stage: tracker.stage,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if report.replaced_chunks > 0 {
            tracing::info!(
                "[{}] committed {} chunks, replaced {} from the previous upload ({}ms)",
                document,
                report.chunks,
                report.replaced_chunks,
                report.elapsed_ms
            );
        } else {
            tracing::info!(
                "[{}] committed {} chunks ({}ms)",
                document,
                report.chunks,
                report.elapsed_ms
            );
        }

        Ok(report)
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embedder.embed_batch(batch).await?);
            tracing::debug!("embedded {}/{} chunks", embeddings.len(), texts.len());
        }
        Ok(embeddings)
    }

    /// Remove every chunk of a document, returning how many were removed
    pub async fn delete(&self, document: &str) -> Result<usize> {
        // Names are stored trimmed
        let document = document.trim();
        if document.is_empty() {
            return Err(Error::invalid("document name must not be empty"));
        }
        let index = Arc::clone(&self.index);
        let name = document.to_string();
        let removed = tokio::task::spawn_blocking(move || index.delete_document(&name))
            .await
            .map_err(|e| Error::internal(format!("delete task failed: {}", e)))??;

        if removed == 0 {
            return Err(Error::DocumentNotFound(document.to_string()));
        }
        tracing::info!("[{}] deleted {} chunks", document, removed);
        Ok(removed)
    }

    /// Remove every document
    pub async fn clear(&self) -> Result<ClearOutcome> {
        let index = Arc::clone(&self.index);
        let outcome = tokio::task::spawn_blocking(move || index.clear())
            .await
            .map_err(|e| Error::internal(format!("clear task failed: {}", e)))??;

        tracing::info!(
            "Cleared {} documents, {} chunks",
            outcome.documents,
            outcome.chunks
        );
        Ok(outcome)
    }

    fn chunker_for(&self, options: &IngestOptions) -> Result<TextChunker> {
        match (options.chunk_size, options.chunk_overlap) {
            (None, None) => Ok(self.chunker),
            (size, overlap) => TextChunker::new(
                size.unwrap_or(self.chunker.chunk_size()),
                overlap.unwrap_or(self.chunker.overlap()),
            ),
        }
    }
}
