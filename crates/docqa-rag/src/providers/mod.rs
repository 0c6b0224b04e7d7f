//! Provider abstractions for embeddings and answer generation
//!
//! Backends are chosen once at startup from configuration and shared as
//! trait objects.

pub mod embedding;
pub mod fallback;
pub mod huggingface;
pub mod llm;
pub mod ollama;
pub mod openai;

pub use embedding::EmbeddingProvider;
pub use fallback::FallbackLlm;
pub use llm::LlmProvider;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingBackend, LlmBackend, RagConfig};
use crate::error::{Error, Result};

use huggingface::HuggingFaceLlm;
use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
use openai::{OpenAiChat, OpenAiClient, OpenAiEmbedder};

/// Retry a request with exponential backoff (1s, 2s, 4s, ...)
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    max_retries: u32,
    what: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what,
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Lazily shared clients so one backend is only built once
#[derive(Default)]
struct Clients {
    ollama: Option<Arc<OllamaClient>>,
    openai: Option<Arc<OpenAiClient>>,
}

impl Clients {
    fn ollama(&mut self, config: &RagConfig) -> Result<Arc<OllamaClient>> {
        if let Some(client) = &self.ollama {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(OllamaClient::new(&config.llm)?);
        self.ollama = Some(Arc::clone(&client));
        Ok(client)
    }

    fn openai(&mut self, config: &RagConfig) -> Result<Arc<OpenAiClient>> {
        if let Some(client) = &self.openai {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(OpenAiClient::new(&config.llm)?);
        self.openai = Some(Arc::clone(&client));
        Ok(client)
    }

    fn llm(&mut self, backend: LlmBackend, config: &RagConfig) -> Result<Arc<dyn LlmProvider>> {
        let provider: Arc<dyn LlmProvider> = match backend {
            LlmBackend::Ollama => Arc::new(OllamaLlm::new(self.ollama(config)?, &config.llm)),
            LlmBackend::OpenAi => Arc::new(OpenAiChat::new(self.openai(config)?, &config.llm)),
            LlmBackend::HuggingFace => Arc::new(HuggingFaceLlm::new(&config.llm)?),
            LlmBackend::Fallback => {
                let providers = config
                    .llm
                    .fallback_order
                    .iter()
                    .filter(|b| **b != LlmBackend::Fallback)
                    .map(|b| self.llm(*b, config))
                    .collect::<Result<Vec<_>>>()?;
                if providers.is_empty() {
                    return Err(Error::Config("llm.fallback_order must not be empty".into()));
                }
                Arc::new(FallbackLlm::new(providers))
            }
        };
        Ok(provider)
    }
}

/// Build the configured embedding and generation providers
pub fn build_providers(
    config: &RagConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    let mut clients = Clients::default();

    let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.backend {
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(
            clients.ollama(config)?,
            config.embeddings.model.clone(),
            config.embeddings.dimensions,
        )),
        EmbeddingBackend::OpenAi => Arc::new(OpenAiEmbedder::new(
            clients.openai(config)?,
            config.embeddings.model.clone(),
            config.embeddings.dimensions,
            config.embeddings.batch_size,
        )),
    };

    let llm = clients.llm(config.llm.backend, config)?;

    tracing::info!(
        "Providers: embeddings={} ({}), generation={} ({})",
        embedder.name(),
        embedder.model(),
        llm.name(),
        llm.model()
    );

    Ok((embedder, llm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result = retry_with_backoff(2, "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::generation("flaky"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<()> = retry_with_backoff(1, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::embedding("down"))
        })
        .await;

        assert!(matches!(result, Err(Error::EmbeddingUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_build_default_providers() {
        let config = RagConfig::default();
        let (embedder, llm) = build_providers(&config).unwrap();

        assert_eq!(embedder.name(), "ollama");
        assert_eq!(embedder.dimensions(), 768);
        assert_eq!(llm.name(), "ollama -> huggingface");
    }
}
