mod embedding;
mod llm;

pub use embedding::EmbeddingService;
pub use llm::{CompletionParams, LlmService};
