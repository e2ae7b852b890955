mod answer;
mod embedding;
mod prompt;
mod rag;
mod retry;
mod session;

pub use answer::{AnswerGenerator, DEFAULT_TEMPERATURE};
pub use embedding::EmbeddingGateway;
pub use prompt::{citation_marker, ComposedPrompt, PromptComposer, DEFAULT_INSTRUCTIONS, DEFAULT_REFUSAL};
pub use rag::RagService;
pub use retry::{with_retry, RetryPolicy, MAX_RETRIES};
pub use session::{Phase, Pipeline, Session, SessionRegistry, SessionStatus};
