use crate::domain::{errors::DomainError, Embedding};
use async_trait::async_trait;

/// Single texts go through `EmbeddingGateway::embed_query`, which validates
/// them like any batch.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds every text, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError>;

    /// Identity of the underlying model, recorded alongside persisted indexes.
    fn model(&self) -> &str;

    fn dimension(&self) -> usize;
}
