pub mod config;
pub mod embedding;
pub mod llm;
pub mod vector_store;

pub use config::{AppConfig, Config, PromptsConfig};
pub use embedding::TextEmbedding;
pub use llm::{AnthropicLlm, OpenAiLlm};
pub use vector_store::{IndexTag, VectorIndex};
