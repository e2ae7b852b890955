use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::application::services::{
    AnswerGenerator, EmbeddingGateway, Pipeline, PromptComposer, RagService, RetryPolicy,
    DEFAULT_INSTRUCTIONS, DEFAULT_REFUSAL, DEFAULT_TEMPERATURE, MAX_RETRIES,
};
use crate::domain::ports::{CompletionParams, EmbeddingService, LlmService};
use crate::domain::{Chunker, DomainError, Result};

pub const CONFIG_PATH_ENV: &str = "DOCQA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub config: Config,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub rag: RagConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `anthropic` or `openai`.
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: 2048,
            timeout_seconds: 60,
            max_retries: MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            batch_size: 64,
            max_retries: MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub min_score: f32,
    pub dedup_overlap_ratio: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 8,
            min_score: 0.0,
            dedup_overlap_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 200,
            backoff_multiplier: 2.0,
            max_backoff_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Built indexes are persisted and reused here when set.
    pub index_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest document text accepted, in bytes.
    pub max_document_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_document_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Grounding rules placed before the context. `{refusal}` is replaced
    /// with the refusal sentence.
    pub instructions: String,
    pub refusal: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            refusal: DEFAULT_REFUSAL.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `$DOCQA_CONFIG` (or `config.yaml`), then applies environment
    /// overrides and validates the result.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let path = Path::new(&path);

        let mut config = if path.is_file() {
            info!(path = %path.display(), "loading configuration");
            Self::from_file(path)?
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DomainError::invalid_config(format!("{}: {e}", path.display())))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| DomainError::invalid_config(e.to_string()))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        let config = &mut self.config;
        if let Some(host) = var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = var("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| DomainError::invalid_config(format!("invalid SERVER_PORT: {port}")))?;
        }
        if let Some(model) = var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(dir) = var("INDEX_DIR") {
            config.storage.index_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    /// Wires the services together around the given providers.
    pub fn pipeline(
        &self,
        embedder: Arc<dyn EmbeddingService>,
        llm: Arc<dyn LlmService>,
    ) -> Result<Pipeline> {
        let config = &self.config;
        config.validate()?;

        let gateway = EmbeddingGateway::new(embedder)
            .with_batch_size(config.embedding.batch_size)
            .with_retry(config.retry_policy(config.embedding.max_retries));

        let rag = RagService::new(
            Arc::new(gateway),
            Chunker::new(config.rag.chunk_size, config.rag.chunk_overlap)?,
            config.rag.top_k,
        )
        .with_min_score(config.rag.min_score)
        .with_dedup_overlap_ratio(config.rag.dedup_overlap_ratio);

        let generator = AnswerGenerator::new(llm)
            .with_params(CompletionParams {
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            })
            .with_timeout(Duration::from_secs(config.llm.timeout_seconds))
            .with_retry(config.retry_policy(config.llm.max_retries));

        let composer = PromptComposer::new(&self.prompts.instructions, &self.prompts.refusal);

        let pipeline = Pipeline::new(Arc::new(rag), Arc::new(composer), Arc::new(generator));
        Ok(match &config.storage.index_dir {
            Some(dir) => pipeline.with_index_dir(dir),
            None => pipeline,
        })
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(DomainError::invalid_config("rag.chunk_size must be greater than zero"));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(DomainError::invalid_config(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.top_k == 0 {
            return Err(DomainError::invalid_config("rag.top_k must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&rag.dedup_overlap_ratio) {
            return Err(DomainError::invalid_config(
                "rag.dedup_overlap_ratio must be between 0 and 1",
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(DomainError::invalid_config(
                "embedding.dimension must be greater than zero",
            ));
        }
        if self.llm.max_retries > MAX_RETRIES || self.embedding.max_retries > MAX_RETRIES {
            return Err(DomainError::invalid_config(format!(
                "max_retries must not exceed {MAX_RETRIES}"
            )));
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(DomainError::invalid_config("llm.temperature must be between 0 and 1"));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(DomainError::invalid_config(
                "llm.timeout_seconds must be greater than zero",
            ));
        }
        if self.server.max_document_bytes == 0 {
            return Err(DomainError::invalid_config(
                "server.max_document_bytes must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self, max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_backoff(
            Duration::from_millis(self.retry.initial_backoff_ms),
            self.retry.backoff_multiplier,
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }
}
