use crate::domain::errors::DomainError;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f64,
    pub max_tokens: u64,
}

#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, prompt: &str, params: &CompletionParams)
        -> Result<String, DomainError>;

    fn model(&self) -> &str;
}
