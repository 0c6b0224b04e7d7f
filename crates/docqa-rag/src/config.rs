//! Configuration for the document Q&A server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Answer generation configuration
    pub llm: LlmConfig,
    /// Vector store configuration
    pub vector_db: VectorDbConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Per-call time budgets
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let mut config: RagConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional path; defaults plus environment when absent
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply the supported environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("DOCQA_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("DOCQA_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring DOCQA_PORT={}: not a port number", port),
            }
        }
        if let Ok(dir) = std::env::var("DOCQA_STORAGE_DIR") {
            self.vector_db.storage_dir = PathBuf::from(dir);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.llm.openai.api_key = Some(key);
            }
        }
        if let Ok(token) = std::env::var("HF_API_TOKEN") {
            if !token.is_empty() {
                self.llm.huggingface.api_token = Some(token);
            }
        }
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".into()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be > 0".into()));
        }
        if self.processing.extract_timeout_secs == 0
            || self.processing.embed_timeout_secs == 0
            || self.processing.generate_timeout_secs == 0
        {
            return Err(Error::Config("processing timeouts must be > 0".into()));
        }
        if self.retrieval.default_k == 0 {
            return Err(Error::Config("retrieval.default_k must be > 0".into()));
        }
        if self.retrieval.max_k < self.retrieval.default_k {
            return Err(Error::Config(format!(
                "retrieval.max_k ({}) must be >= retrieval.default_k ({})",
                self.retrieval.max_k, self.retrieval.default_k
            )));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(Error::Config("retrieval.max_context_chars must be > 0".into()));
        }
        if let DeletePolicy::Tombstone { compact_threshold } = self.vector_db.delete_policy {
            if compact_threshold == 0 {
                return Err(Error::Config(
                    "vector_db.delete_policy.compact_threshold must be > 0".into(),
                ));
            }
        }

        let needs_openai = self.embeddings.backend == EmbeddingBackend::OpenAi
            || self.llm.uses(LlmBackend::OpenAi);
        if needs_openai && self.llm.openai.api_key.is_none() {
            return Err(Error::Config(
                "OpenAI backend selected but no API key configured (set OPENAI_API_KEY)".into(),
            ));
        }
        if self.llm.backend == LlmBackend::Fallback && self.llm.fallback_order.is_empty() {
            return Err(Error::Config("llm.fallback_order must not be empty".into()));
        }
        if self.llm.fallback_order.contains(&LlmBackend::Fallback) {
            return Err(Error::Config(
                "llm.fallback_order cannot contain \"fallback\"".into(),
            ));
        }

        Ok(())
    }

    /// Path of the persisted chunk store
    pub fn store_path(&self) -> PathBuf {
        self.vector_db.storage_dir.join(STORE_FILE_NAME)
    }
}

/// File name of the chunk store inside `vector_db.storage_dir`
pub const STORE_FILE_NAME: &str = "chunks.db";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible embeddings API
    #[serde(rename = "openai")]
    OpenAi,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Model name passed to the backend
    pub model: String,
    /// Embedding dimensions, fixed for the lifetime of a store
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Answer generation backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Local Ollama server
    Ollama,
    /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAi,
    /// Hugging Face inference router
    HuggingFace,
    /// Try `fallback_order` in turn
    #[default]
    Fallback,
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LlmBackend::Ollama => "ollama",
            LlmBackend::OpenAi => "openai",
            LlmBackend::HuggingFace => "huggingface",
            LlmBackend::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    /// Backends tried in order when `backend = "fallback"`
    pub fallback_order: Vec<LlmBackend>,
    /// Ollama base URL (also used for Ollama embeddings)
    pub base_url: String,
    /// Ollama generation model
    pub generate_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Retries per request, with exponential backoff
    pub max_retries: u32,
    pub openai: OpenAiConfig,
    pub huggingface: HuggingFaceConfig,
}

impl LlmConfig {
    /// Whether a backend is reachable through this configuration
    pub fn uses(&self, backend: LlmBackend) -> bool {
        self.backend == backend
            || (self.backend == LlmBackend::Fallback && self.fallback_order.contains(&backend))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Fallback,
            fallback_order: vec![LlmBackend::Ollama, LlmBackend::HuggingFace],
            base_url: "http://localhost:11434".to_string(),
            generate_model: "llama3.2".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 120,
            max_retries: 2,
            openai: OpenAiConfig::default(),
            huggingface: HuggingFaceConfig::default(),
        }
    }
}

/// OpenAI API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    /// Usually supplied through `OPENAI_API_KEY`
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub chat_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            chat_model: "gpt-3.5-turbo".to_string(),
        }
    }
}

/// Hugging Face inference router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    pub base_url: String,
    /// Optional; some public models answer without one
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub model: String,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.huggingface.co/models".to_string(),
            api_token: None,
            model: "HuggingFaceH4/zephyr-7b-beta".to_string(),
        }
    }
}

/// Distance function used by the similarity index
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared L2 distance
    #[default]
    Euclidean,
    /// `1 - cosine similarity`
    Cosine,
}

/// What happens to index entries when their chunks are deleted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Rebuild the index inside the deleting writer's section
    Rebuild,
    /// Filter deleted ids at search time, compact past the threshold
    Tombstone { compact_threshold: usize },
}

impl Default for DeletePolicy {
    fn default() -> Self {
        DeletePolicy::Rebuild
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletePolicy::Rebuild => f.write_str("rebuild"),
            DeletePolicy::Tombstone { compact_threshold } => {
                write!(f, "tombstone(compact_threshold={})", compact_threshold)
            }
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Directory holding the chunk store file
    pub storage_dir: PathBuf,
    pub metric: DistanceMetric,
    pub delete_policy: DeletePolicy,
    /// Index size above which searches scan in parallel
    pub parallel_scan_threshold: usize,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let storage_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docqa-rag");

        Self {
            storage_dir,
            metric: DistanceMetric::Euclidean,
            delete_policy: DeletePolicy::Rebuild,
            parallel_scan_threshold: 4096,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Excerpts per question when the request does not say
    pub default_k: usize,
    /// Upper bound on context characters sent to the generator
    pub max_context_chars: usize,
    /// Upper bound on `k` accepted from requests
    pub max_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: crate::types::query::DEFAULT_TOP_K,
            max_context_chars: 6000,
            max_k: 50,
        }
    }
}

/// Processing time budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Budget for extracting text from one upload
    pub extract_timeout_secs: u64,
    /// Budget for embedding one document, or one question
    pub embed_timeout_secs: u64,
    /// Budget for one answer generation, retries included
    pub generate_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            extract_timeout_secs: 60,
            embed_timeout_secs: 300,
            generate_timeout_secs: 180,
        }
    }
}

impl ProcessingConfig {
    pub fn extract_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.extract_timeout_secs)
    }

    pub fn embed_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.embed_timeout_secs)
    }

    pub fn generate_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.generate_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.retrieval.default_k, 3);
        assert_eq!(config.vector_db.delete_policy, DeletePolicy::Rebuild);
        assert!(config.store_path().ends_with("chunks.db"));
    }

    #[test]
    fn test_partial_toml() {
        let config: RagConfig = toml::from_str(
            r#"
            [chunking]
            chunk_size = 400
            chunk_overlap = 50

            [vector_db]
            metric = "cosine"
            delete_policy = { mode = "tombstone", compact_threshold = 64 }

            [llm]
            backend = "ollama"
            "#,
        )
        .unwrap();

        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.embeddings.dimensions, 768);
        assert_eq!(config.vector_db.metric, DistanceMetric::Cosine);
        assert_eq!(
            config.vector_db.delete_policy,
            DeletePolicy::Tombstone { compact_threshold: 64 }
        );
        assert_eq!(config.llm.backend, LlmBackend::Ollama);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());

        let mut config = RagConfig::default();
        config.embeddings.dimensions = 0;
        assert!(config.validate().is_err());

        let mut config = RagConfig::default();
        config.llm.backend = LlmBackend::OpenAi;
        config.llm.openai.api_key = None;
        assert!(config.validate().is_err());
        config.llm.openai.api_key = Some("sk-test".into());
        assert!(config.validate().is_ok());

        let mut config = RagConfig::default();
        config.vector_db.delete_policy = DeletePolicy::Tombstone { compact_threshold: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_k() {
        let mut config = RagConfig::default();
        config.retrieval.max_k = 0;
        assert!(config.validate().is_err());

        config.retrieval.max_k = config.retrieval.default_k - 1;
        assert!(config.validate().is_err());

        config.retrieval.max_k = config.retrieval.default_k;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fallback_uses() {
        let llm = LlmConfig::default();
        assert!(llm.uses(LlmBackend::Ollama));
        assert!(llm.uses(LlmBackend::HuggingFace));
        assert!(!llm.uses(LlmBackend::OpenAi));
    }
}
