//! Hugging Face inference router

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;

use super::llm::LlmProvider;
use super::retry_with_backoff;

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

/// Text generation through the Hugging Face router
pub struct HuggingFaceLlm {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl HuggingFaceLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.huggingface.base_url.trim_end_matches('/').to_string(),
            api_token: config.huggingface.api_token.clone(),
            model: config.huggingface.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    fn model_url(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }
}

/// Pull the generated text out of the shapes the router returns
fn extract_generated_text(value: Value) -> Option<String> {
    let value = match value {
        Value::Array(items) => items.into_iter().next()?,
        other => other,
    };

    match value {
        Value::String(text) => Some(text),
        Value::Object(map) => ["generated_text", "text", "response", "output", "content"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str).map(str::to_string)),
        _ => None,
    }
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    match status {
        StatusCode::SERVICE_UNAVAILABLE => "Hugging Face model is loading, try again shortly".into(),
        StatusCode::TOO_MANY_REQUESTS => "Hugging Face rate limit exceeded".into(),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            "Hugging Face rejected the request; this model may need an API token (HF_API_TOKEN)"
                .into()
        }
        _ => {
            let error = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string));
            match error {
                Some(message) => format!("Hugging Face error {}: {}", status, message),
                // Don't echo HTML error pages
                None if body.trim_start().starts_with('<') => {
                    format!("Hugging Face returned an error page (HTTP {})", status)
                }
                None => format!(
                    "Hugging Face error {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            }
        }
    }
}

#[async_trait]
impl LlmProvider for HuggingFaceLlm {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let prompt = PromptBuilder::build_prompt(question, context);
        let prompt = prompt.as_str();
        let url = self.model_url();
        let url = url.as_str();

        tracing::info!("Generating answer with Hugging Face model: {}", self.model);

        retry_with_backoff(self.max_retries, "Hugging Face generation", move || async move {
            let request = InferenceRequest {
                inputs: prompt,
                parameters: InferenceParameters {
                    max_new_tokens: self.max_tokens,
                    temperature: self.temperature,
                    return_full_text: false,
                },
            };

            let mut builder = self.client.post(url).json(&request);
            if let Some(token) = &self.api_token {
                builder = builder.bearer_auth(token);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::generation(format!("Hugging Face request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::generation(describe_failure(status, &body)));
            }

            let value: Value = response.json().await.map_err(|e| {
                Error::generation(format!("Failed to parse Hugging Face response: {}", e))
            })?;

            extract_generated_text(value)
                .map(|text| text.trim().to_string())
                .ok_or_else(|| Error::generation("Hugging Face response had no generated text"))
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        // The router has no cheap health endpoint; a reachable host is enough
        match self.client.head(&self.base_url).send().await {
            Ok(response) => Ok(!response.status().is_server_error()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "huggingface"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_generated_text_shapes() {
        assert_eq!(
            extract_generated_text(json!([{"generated_text": "answer"}])),
            Some("answer".to_string())
        );
        assert_eq!(
            extract_generated_text(json!({"text": "t"})),
            Some("t".to_string())
        );
        assert_eq!(
            extract_generated_text(json!("plain")),
            Some("plain".to_string())
        );
        assert_eq!(extract_generated_text(json!({"other": 1})), None);
        assert_eq!(extract_generated_text(json!([])), None);
    }

    #[test]
    fn test_failure_messages() {
        assert!(describe_failure(StatusCode::SERVICE_UNAVAILABLE, "").contains("loading"));
        assert!(describe_failure(StatusCode::BAD_REQUEST, r#"{"error":"bad input"}"#)
            .contains("bad input"));
        assert!(!describe_failure(StatusCode::NOT_FOUND, "<html>nope</html>").contains("<html>"));
    }
}
