//! Application state for the document Q&A server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::providers::{build_providers, EmbeddingProvider, LlmProvider};
use crate::retrieval::Retriever;
use crate::storage::DocumentIndex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    /// Record store and similarity index
    index: Arc<DocumentIndex>,
    pipeline: IngestPipeline,
    retriever: Retriever,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    ready: RwLock<bool>,
}

impl AppState {
    /// Open the persisted store and build the configured providers
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (store: {})",
            config.store_path().display()
        );

        let open_config = config.clone();
        let index = tokio::task::spawn_blocking(move || DocumentIndex::open(&open_config))
            .await
            .map_err(|e| Error::internal(format!("store open task failed: {}", e)))??;
        tracing::info!(
            "Chunk store ready: {} chunks in {} documents",
            index.count(),
            index.document_count()
        );

        let (embedder, llm) = build_providers(&config)?;

        if !embedder.health_check().await.unwrap_or(false) {
            tracing::warn!(
                "Embedding backend {} is not reachable; uploads and questions will fail until it is",
                embedder.name()
            );
        }
        if !llm.health_check().await.unwrap_or(false) {
            tracing::warn!("Generation backend {} is not reachable", llm.name());
        }

        Self::from_parts(config, Arc::new(index), embedder, llm)
    }

    /// Assemble state around an existing engine and providers
    pub fn from_parts(
        config: RagConfig,
        index: Arc<DocumentIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(Error::Config(format!(
                "embedding backend produces {} dimensions but the store holds {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }

        let pipeline = IngestPipeline::new(Arc::clone(&index), Arc::clone(&embedder), &config)?;
        let retriever = Retriever::new(
            Arc::clone(&index),
            Arc::clone(&embedder),
            Arc::clone(&llm),
            &config,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                index,
                pipeline,
                retriever,
                embedder,
                llm,
                ready: RwLock::new(true),
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.inner.index
    }

    pub fn pipeline(&self) -> &IngestPipeline {
        &self.inner.pipeline
    }

    pub fn retriever(&self) -> &Retriever {
        &self.inner.retriever
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
