use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::openai;

use crate::domain::ports::{CompletionParams, LlmService};
use crate::domain::DomainError;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub struct OpenAiLlm {
    model: String,
}

impl OpenAiLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl LlmService for OpenAiLlm {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, DomainError> {
        let client = openai::Client::from_env();
        let agent = client
            .agent(&self.model)
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .build();
        agent
            .prompt(prompt)
            .await
            .map_err(|e| DomainError::generation(e.to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
