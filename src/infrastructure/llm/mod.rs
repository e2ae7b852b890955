mod anthropic;
mod openai;

use std::sync::Arc;

pub use anthropic::AnthropicLlm;
pub use openai::OpenAiLlm;

use crate::domain::{ports::LlmService, DomainError, Result};
use crate::infrastructure::config::LlmConfig;

/// Selects the completion provider named in `config`.
///
/// rig clients panic on a missing key, so the key is checked up front.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn LlmService>> {
    let (key, llm): (&str, Arc<dyn LlmService>) = match config.provider.as_str() {
        "anthropic" => (anthropic::API_KEY_ENV, Arc::new(AnthropicLlm::new(&config.model))),
        "openai" => (openai::API_KEY_ENV, Arc::new(OpenAiLlm::new(&config.model))),
        other => {
            return Err(DomainError::invalid_config(format!(
                "unsupported llm provider: {other}"
            )))
        }
    };

    if std::env::var(key).is_err() {
        return Err(DomainError::invalid_config(format!("{key} is not set")));
    }
    Ok(llm)
}
