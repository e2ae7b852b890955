use std::sync::Arc;
use tracing::instrument;

use super::retry::{with_retry, RetryPolicy};
use crate::domain::{ports::EmbeddingService, DomainError, Embedding, Result};

/// Validating, batching front for the external embedding capability.
///
/// Every vector handed back has the service's declared dimension and only
/// finite components; anything else is reported as
/// [`DomainError::EmbeddingUnavailable`] after the retry budget is spent.
pub struct EmbeddingGateway {
    service: Arc<dyn EmbeddingService>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl EmbeddingGateway {
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            service,
            batch_size: 64,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        self.service.model()
    }

    pub fn dimension(&self) -> usize {
        self.service.dimension()
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed(&[text])
            .await?
            .pop()
            .ok_or_else(|| DomainError::embedding("No embedding returned"))
    }

    #[instrument(skip(self, texts), fields(count = texts.len(), batch_size = self.batch_size))]
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let vectors = with_retry(&self.retry, "embed", || self.embed_checked(batch)).await?;
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    async fn embed_checked(&self, batch: &[&str]) -> Result<Vec<Embedding>> {
        let vectors = self.service.embed_batch(batch).await?;

        if vectors.len() != batch.len() {
            return Err(DomainError::embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let dimension = self.dimension();
        for vector in &vectors {
            if vector.dimension() != dimension {
                return Err(DomainError::embedding(format!(
                    "expected dimension {dimension}, got {}",
                    vector.dimension()
                )));
            }
            if !vector.is_finite() {
                return Err(DomainError::embedding("embedding contains non-numeric values"));
            }
        }

        Ok(vectors)
    }
}
