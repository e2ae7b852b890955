//! Application layer - Use cases and orchestration.
//!
//! Services here drive the question-answering flow over domain ports
//! (traits) and never touch a concrete provider.

pub mod services;

pub use services::{
    AnswerGenerator, EmbeddingGateway, Pipeline, PromptComposer, RagService, Session,
    SessionRegistry,
};
