#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa::application::services::{
    AnswerGenerator, EmbeddingGateway, Pipeline, PromptComposer, RagService, RetryPolicy,
    DEFAULT_REFUSAL,
};
use docqa::domain::ports::{CompletionParams, LlmService};
use docqa::domain::{Chunker, DomainError};
use docqa::test_support::{tokens, VocabularyEmbedder};

/// Completion model that behaves like an obedient grounded answerer: it
/// quotes the first context chunk sharing a word with the question, or
/// replies with the refusal sentence.
#[derive(Default)]
pub struct ExtractiveLlm {
    prompts: Mutex<Vec<String>>,
}

impl ExtractiveLlm {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn answer(prompt: &str) -> String {
        let context = prompt
            .split_once("Context from the document:\n")
            .and_then(|(_, rest)| rest.split_once("\n\nQuestion: "));
        let Some((context, rest)) = context else {
            return DEFAULT_REFUSAL.to_string();
        };
        let question = rest.lines().next().unwrap_or_default();
        let wanted: Vec<String> = tokens(question).collect();

        for block in context.split("\n\n") {
            let Some((marker, text)) = block.split_once('\n') else {
                continue;
            };
            if tokens(text).any(|t| wanted.contains(&t)) {
                return format!("\"{text}\" {marker}");
            }
        }
        DEFAULT_REFUSAL.to_string()
    }
}

#[async_trait]
impl LlmService for ExtractiveLlm {
    async fn complete(
        &self,
        prompt: &str,
        _params: &CompletionParams,
    ) -> Result<String, DomainError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Self::answer(prompt))
    }

    fn model(&self) -> &str {
        "extractive"
    }
}

pub fn pipeline(chunk_size: usize, overlap: usize, llm: Arc<ExtractiveLlm>) -> Pipeline {
    let gateway = EmbeddingGateway::new(Arc::new(VocabularyEmbedder::new(512)))
        .with_retry(RetryPolicy::none());
    let rag = RagService::new(
        Arc::new(gateway),
        Chunker::new(chunk_size, overlap).unwrap(),
        4,
    );
    Pipeline::new(
        Arc::new(rag),
        Arc::new(PromptComposer::default()),
        Arc::new(AnswerGenerator::new(llm).with_retry(RetryPolicy::none())),
    )
}

pub const SOFTMAX: &str =
    "The softmax function converts logits into probabilities that sum to one.";

pub const HANDBOOK: &str = "\
Rust guarantees memory safety through its ownership model and the borrow checker. \
Cargo is the package manager that builds crates and resolves dependencies. \
Tokio is an asynchronous runtime used for network services and timers. \
Serde provides serialization frameworks for formats such as JSON and YAML. \
Axum is a web framework built on hyper and tower middleware. \
Tracing records structured diagnostics through spans and events.";
