//! Ordered fallback across generation backends

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::llm::LlmProvider;

/// Tries each provider in order; the first answer wins
pub struct FallbackLlm {
    providers: Vec<Arc<dyn LlmProvider>>,
    name: String,
}

impl FallbackLlm {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        let name = providers
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join(" -> ");
        Self { providers, name }
    }

    pub fn providers(&self) -> &[Arc<dyn LlmProvider>] {
        &self.providers
    }
}

#[async_trait]
impl LlmProvider for FallbackLlm {
    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            match provider.generate(question, context).await {
                Ok(answer) => return Ok(answer),
                Err(e) => {
                    tracing::warn!("{} failed: {}, trying next backend", provider.name(), e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(Error::generation(format!(
            "no generation backend available ({})",
            failures.join("; ")
        )))
    }

    async fn health_check(&self) -> Result<bool> {
        for provider in &self.providers {
            if provider.health_check().await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        self.providers.first().map(|p| p.model()).unwrap_or("none")
    }
}
