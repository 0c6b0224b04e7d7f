//! LLM provider trait for generating answers

use async_trait::async_trait;
use crate::error::Result;

/// Trait for answer generation from a question and retrieved context
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.2, phi3, etc.)
/// - `OpenAiChat`: OpenAI chat completions (gpt-3.5-turbo)
/// - `HuggingFaceLlm`: Hugging Face inference router
/// - `FallbackLlm`: first of several providers that succeeds
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate an answer to `question` from `context`
    async fn generate(&self, question: &str, context: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
