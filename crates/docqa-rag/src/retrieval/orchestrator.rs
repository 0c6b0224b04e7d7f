//! Question answering over the indexed chunks

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::storage::{DocumentIndex, ResolvedHit};
use crate::types::{AskRequest, AskResponse, SourceExcerpt};

/// Answers questions: embed, search, build context, generate.
///
/// Never writes to the store or the index.
pub struct Retriever {
    index: Arc<DocumentIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    default_k: usize,
    max_context_chars: usize,
    max_k: usize,
    embed_timeout: Duration,
    generate_timeout: Duration,
}

impl Retriever {
    pub fn new(
        index: Arc<DocumentIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            default_k: config.retrieval.default_k,
            max_context_chars: config.retrieval.max_context_chars,
            max_k: config.retrieval.max_k,
            embed_timeout: config.processing.embed_timeout(),
            generate_timeout: config.processing.generate_timeout(),
        }
    }

    /// Answer a question from the k nearest chunks
    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        let start = Instant::now();

        // Checked before any external call
        if self.index.is_empty() {
            return Err(Error::EmptyIndex);
        }

        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::invalid("question must not be empty"));
        }
        let k = request.k_or(self.default_k);
        if k == 0 {
            return Err(Error::invalid("k must be at least 1"));
        }
        if k > self.max_k {
            return Err(Error::invalid(format!(
                "k must be at most {}, got {}",
                self.max_k, k
            )));
        }

        tracing::info!("Question: \"{}\" (k={})", question, k);

        let embedding = match timeout(self.embed_timeout, self.embedder.embed(question)).await {
            Ok(Ok(embedding)) => embedding,
            Ok(Err(Error::EmbeddingUnavailable(message))) => {
                return Err(Error::EmbeddingUnavailable(message))
            }
            Ok(Err(e)) => return Err(Error::embedding(e.to_string())),
            Err(_) => {
                tracing::error!(
                    "Question embedding timed out after {}s",
                    self.embed_timeout.as_secs()
                );
                return Err(Error::embedding(format!(
                    "embedding the question took longer than {}s",
                    self.embed_timeout.as_secs()
                )));
            }
        };
        if embedding.len() != self.index.dimensions() {
            return Err(Error::embedding(format!(
                "embedder returned {} dimensions, expected {}",
                embedding.len(),
                self.index.dimensions()
            )));
        }

        let hits = self.index.search(&embedding, k);
        if hits.is_empty() {
            // Everything was deleted between the emptiness check and the search
            return Err(Error::EmptyIndex);
        }
        tracing::debug!("Retrieved {} chunks", hits.len());

        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        let context = PromptBuilder::build_context(&texts, self.max_context_chars);

        let answer = match timeout(
            self.generate_timeout,
            self.llm.generate(question, &context.text),
        )
        .await
        {
            Ok(Ok(answer)) => answer,
            Ok(Err(Error::GenerationUnavailable(message))) => {
                return Err(Error::GenerationUnavailable(message))
            }
            Ok(Err(e)) => return Err(Error::generation(e.to_string())),
            Err(_) => {
                tracing::error!(
                    "Answer generation timed out after {}s",
                    self.generate_timeout.as_secs()
                );
                return Err(Error::generation(format!(
                    "answer generation took longer than {}s",
                    self.generate_timeout.as_secs()
                )));
            }
        };

        let sources: Vec<SourceExcerpt> = hits
            .into_iter()
            .take(context.used)
            .map(excerpt_from_hit)
            .collect();

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Answered with {} sources in {}ms",
            sources.len(),
            processing_time_ms
        );

        Ok(AskResponse::new(answer, sources, processing_time_ms))
    }
}

fn excerpt_from_hit(hit: ResolvedHit) -> SourceExcerpt {
    SourceExcerpt {
        chunk_id: hit.chunk.id,
        document: hit.chunk.source_document,
        position: hit.chunk.position,
        distance: hit.distance,
        text: hit.chunk.text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeletePolicy, DistanceMetric};
    use crate::index::FlatIndex;
    use crate::storage::RecordStore;
    use crate::types::EmbeddedChunk;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds every question at a fixed point
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    /// Echoes the context back and counts calls
    #[derive(Default)]
    struct EchoLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, _question: &str, context: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(context.to_string())
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

    struct DownLlm;

    #[async_trait]
    impl LlmProvider for DownLlm {
        async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
            Err(Error::Internal("socket closed".into()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "down"
        }

        fn model(&self) -> &str {
            "down"
        }
    }

    /// Never answers within a test
    struct StalledLlm;

    #[async_trait]
    impl LlmProvider for StalledLlm {
        async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".into())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stalled"
        }

        fn model(&self) -> &str {
            "stalled"
        }
    }

    /// Never embeds within a test
    struct StalledEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StalledEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![0.0, 0.0])
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "stalled"
        }

        fn model(&self) -> &str {
            "stalled"
        }
    }

    fn index_with(docs: &[(&str, &[(f32, &str)])]) -> Arc<DocumentIndex> {
        let index = Arc::new(DocumentIndex::new(
            RecordStore::in_memory(2),
            Box::new(FlatIndex::new(2, DistanceMetric::Euclidean)),
            DeletePolicy::Rebuild,
        ));
        for (name, chunks) in docs {
            let chunks = chunks
                .iter()
                .enumerate()
                .map(|(i, (x, text))| EmbeddedChunk::new(text.to_string(), vec![*x, 0.0], i as u32))
                .collect();
            index.commit_document(name, chunks).unwrap();
        }
        index
    }

    fn retriever(index: Arc<DocumentIndex>, llm: Arc<dyn LlmProvider>) -> Retriever {
        Retriever::new(
            index,
            Arc::new(FixedEmbedder(vec![0.0, 0.0])),
            llm,
            &RagConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_index_checked_first() {
        let llm = Arc::new(EchoLlm::default());
        let retriever = retriever(index_with(&[]), llm.clone());

        // Even an invalid request reports the empty index
        let err = retriever.ask(&AskRequest::new("").with_k(0)).await.unwrap_err();
        assert!(matches!(err, Error::EmptyIndex));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let retriever = retriever(
            index_with(&[("a.txt", &[(1.0, "alpha")])]),
            Arc::new(EchoLlm::default()),
        );

        for request in [
            AskRequest::new("   "),
            AskRequest::new("what?").with_k(0),
            AskRequest::new("what?").with_k(10_000),
        ] {
            assert!(matches!(
                retriever.ask(&request).await,
                Err(Error::InvalidParameters(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_sources_nearest_first() {
        let retriever = retriever(
            index_with(&[
                ("a.txt", &[(3.0, "far"), (1.0, "near")]),
                ("b.txt", &[(2.0, "middle"), (9.0, "farthest")]),
            ]),
            Arc::new(EchoLlm::default()),
        );

        let response = retriever.ask(&AskRequest::new("which?")).await.unwrap();
        assert_eq!(response.sources, vec!["near", "middle", "far"]);
        assert_eq!(response.source_details[1].document, "b.txt");
        assert!(response.answer.starts_with("[Document Excerpt 1]:\nnear"));
    }

    #[tokio::test]
    async fn test_context_bound_limits_sources() {
        let long = "x".repeat(100);
        let index = index_with(&[("a.txt", &[(1.0, long.as_str()), (2.0, "second")])]);
        let mut config = RagConfig::default();
        config.retrieval.max_context_chars = 50;
        let retriever = Retriever::new(
            index,
            Arc::new(FixedEmbedder(vec![0.0, 0.0])),
            Arc::new(EchoLlm::default()),
            &config,
        );

        let response = retriever.ask(&AskRequest::new("q").with_k(2)).await.unwrap();
        assert_eq!(response.sources.len(), 1);
        assert!(response.answer.chars().count() <= 50);
    }

    #[tokio::test]
    async fn test_generation_failure_is_unavailable() {
        let retriever = retriever(
            index_with(&[("a.txt", &[(1.0, "alpha")])]),
            Arc::new(DownLlm),
        );

        let err = retriever.ask(&AskRequest::new("what?")).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_timeout_is_unavailable() {
        let retriever = retriever(
            index_with(&[("a.txt", &[(1.0, "alpha")])]),
            Arc::new(StalledLlm),
        );

        let err = retriever.ask(&AskRequest::new("what?")).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
        assert!(err.to_string().contains("took longer than"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_embed_timeout_is_unavailable() {
        let llm = Arc::new(EchoLlm::default());
        let retriever = Retriever::new(
            index_with(&[("a.txt", &[(1.0, "alpha")])]),
            Arc::new(StalledEmbedder),
            llm.clone(),
            &RagConfig::default(),
        );

        let err = retriever.ask(&AskRequest::new("what?")).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }
}
