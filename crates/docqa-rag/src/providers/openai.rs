//! OpenAI embeddings and chat completions

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::{PromptBuilder, SYSTEM_PROMPT};

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;
use super::retry_with_backoff;

/// Authenticated client for an OpenAI-compatible API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("missing OpenAI API key".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| Error::Config("invalid OpenAI API key".into()))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.openai.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    /// Embed a batch of texts, returned in input order
    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let url = url.as_str();

        retry_with_backoff(self.max_retries, "OpenAI embedding", move || async move {
            let response = self
                .client
                .post(url)
                .json(&EmbeddingRequest { model, input: texts })
                .send()
                .await
                .map_err(|e| Error::embedding(format!("OpenAI request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::embedding(describe_failure(status, &body)));
            }

            let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
                Error::embedding(format!("Failed to parse OpenAI embedding response: {}", e))
            })?;
            parsed.data.sort_by_key(|entry| entry.index);

            if parsed.data.len() != texts.len() {
                return Err(Error::embedding(format!(
                    "OpenAI returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                )));
            }

            Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
        })
        .await
    }

    /// Chat completion with a system and a user turn
    pub async fn chat(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let url = url.as_str();

        retry_with_backoff(self.max_retries, "OpenAI chat", move || async move {
            let request = ChatRequest {
                model,
                temperature,
                max_tokens,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: system,
                    },
                    ChatMessage {
                        role: "user",
                        content: user,
                    },
                ],
            };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::generation(format!("OpenAI request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::generation(describe_failure(status, &body)));
            }

            let parsed: ChatResponse = response.json().await.map_err(|e| {
                Error::generation(format!("Failed to parse OpenAI chat response: {}", e))
            })?;

            parsed
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .ok_or_else(|| Error::generation("OpenAI returned no answer"))
        })
        .await
    }

    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    let detail: String = body.chars().take(200).collect();
    format!("OpenAI returned {}: {}", status, detail)
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        client: Arc<OpenAiClient>,
        model: impl Into<String>,
        dimensions: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            dimensions,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self
            .client
            .embed_batch(&self.model, &[text.to_string()])
            .await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::embedding("OpenAI returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.client.embed_batch(&self.model, batch).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI chat provider for answer generation
pub struct OpenAiChat {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChat {
    pub fn new(client: Arc<OpenAiClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.openai.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiChat {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let user = PromptBuilder::build_user_prompt(question, context);
        tracing::info!("Generating answer with OpenAI model: {}", self.model);
        self.client
            .chat(
                &self.model,
                SYSTEM_PROMPT,
                &user,
                self.temperature,
                self.max_tokens,
            )
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
