use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use super::retry::{with_retry, RetryPolicy};
use crate::domain::{
    ports::{CompletionParams, LlmService},
    DomainError, Result,
};

pub const DEFAULT_TEMPERATURE: f64 = 0.1;

/// Completion front with fixed low-temperature decoding and a bounded wait.
pub struct AnswerGenerator {
    llm: Arc<dyn LlmService>,
    params: CompletionParams,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            params: CompletionParams {
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: 2048,
            },
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Sends `prompt` to the completion service.
    ///
    /// Transport failures are retried within the retry policy. A timeout is
    /// returned immediately as [`DomainError::GenerationTimeout`].
    #[instrument(skip(self, prompt), fields(model = %self.llm.model(), prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let raw = with_retry(&self.retry, "generate", || self.complete_once(prompt)).await?;
        Ok(strip_reasoning(&raw))
    }

    async fn complete_once(&self, prompt: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.llm.complete(prompt, &self.params))
            .await
            .map_err(|_| DomainError::GenerationTimeout(self.timeout.as_secs()))?
    }
}

/// Removes `<think>...</think>` blocks emitted by reasoning models. An
/// unterminated block swallows the rest of the output.
fn strip_reasoning(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(open) = rest.find("<think>") {
        out.push_str(&rest[..open]);
        match rest[open..].find("</think>") {
            Some(close) => rest = &rest[open + close + "</think>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);

    out.trim().to_string()
}
