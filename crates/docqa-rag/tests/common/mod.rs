//! Deterministic providers and fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docqa_rag::config::RagConfig;
use docqa_rag::providers::{EmbeddingProvider, LlmProvider};
use docqa_rag::{DocumentIndex, IngestPipeline, Result, Retriever};

/// Keywords counted by `KeywordEmbedder`, one dimension each
pub const KEYWORDS: [&str; 4] = ["apple", "banana", "cherry", "date"];

/// Embeds text as keyword occurrence counts
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|k| text.matches(k).count() as f32)
            .collect())
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }

    fn model(&self) -> &str {
        "keyword-counts"
    }
}

/// Answers with the context it was given, counting calls
#[derive(Default)]
pub struct EchoLlm {
    pub calls: AtomicUsize,
}

impl EchoLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for EchoLlm {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Q: {}\n{}", question, context))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo"
    }
}

/// Config with a store under `dir`, keyword-sized embeddings and 20-char chunks
pub fn test_config(dir: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.vector_db.storage_dir = dir.to_path_buf();
    config.embeddings.dimensions = KEYWORDS.len();
    config.chunking.chunk_size = 20;
    config.chunking.chunk_overlap = 0;
    config
}

/// Engine, pipeline and retriever over the persisted store of `config`
pub struct Harness {
    pub index: Arc<DocumentIndex>,
    pub pipeline: IngestPipeline,
    pub retriever: Retriever,
    pub llm: Arc<EchoLlm>,
}

impl Harness {
    pub fn open(config: &RagConfig) -> Result<Self> {
        let index = Arc::new(DocumentIndex::open(config)?);
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(KeywordEmbedder);
        let llm = Arc::new(EchoLlm::default());

        let pipeline = IngestPipeline::new(Arc::clone(&index), Arc::clone(&embedder), config)?;
        let retriever = Retriever::new(
            Arc::clone(&index),
            embedder,
            Arc::clone(&llm) as Arc<dyn LlmProvider>,
            config,
        );

        Ok(Self {
            index,
            pipeline,
            retriever,
            llm,
        })
    }
}

/// Three 20-char chunks: apples, bananas, then a cherry with one apple
pub const THREE_CHUNKS: &str = "apple apple apple xxbanana banana xxxxxxcherry apple xxxxxxx";
