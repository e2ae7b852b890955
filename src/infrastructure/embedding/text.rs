use async_trait::async_trait;
use rig::client::{EmbeddingsClient, ProviderClient};
use rig::embeddings::EmbeddingModel;
use rig::providers::openai;

use crate::domain::{ports::EmbeddingService, DomainError, Embedding};
use crate::infrastructure::config::EmbeddingConfig;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// OpenAI embeddings through rig.
pub struct TextEmbedding {
    model: String,
    dimension: usize,
}

impl TextEmbedding {
    pub fn new() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }

    /// Fails with `InvalidConfiguration` when the provider is unsupported or
    /// its API key is missing.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, DomainError> {
        if config.provider != "openai" {
            return Err(DomainError::invalid_config(format!(
                "unsupported embedding provider: {}",
                config.provider
            )));
        }
        if std::env::var(API_KEY_ENV).is_err() {
            return Err(DomainError::invalid_config(format!("{API_KEY_ENV} is not set")));
        }
        Ok(Self::new()
            .with_model(&config.model)
            .with_dimension(config.dimension))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

impl Default for TextEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for TextEmbedding {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = openai::Client::from_env();
        let model = client.embedding_model(&self.model);

        let embeddings = model
            .embed_texts(texts.iter().map(|t| t.to_string()))
            .await
            .map_err(|e| DomainError::embedding(e.to_string()))?;

        Ok(embeddings
            .into_iter()
            .map(|emb| Embedding::new(emb.vec.into_iter().map(|x| x as f32).collect()))
            .collect())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
