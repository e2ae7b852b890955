//! Deterministic stand-ins for the external embedding and completion services.
//!
//! Compiled for unit tests and, through the `test-support` feature, for the
//! integration tests under `tests/`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::domain::ports::{CompletionParams, EmbeddingService, LlmService};
use crate::domain::{Chunk, DomainError, Embedding};
use crate::infrastructure::vector_store::{IndexTag, VectorIndex};

const STOP_WORDS: &[&str] = &[
    "the", "and", "what", "which", "who", "how", "does", "that", "this", "are", "was", "for",
    "into", "with",
];

/// Lowercased content words of `text`, the same ones [`VocabularyEmbedder`]
/// places on axes.
pub fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
}

/// Bag-of-words embedder that gives every distinct token its own axis, so
/// texts without shared content words are exactly orthogonal.
pub struct VocabularyEmbedder {
    dimension: usize,
    vocabulary: Mutex<HashMap<String, usize>>,
    batch_calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl VocabularyEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vocabulary: Mutex::new(HashMap::new()),
            batch_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Blocks every batch call until a permit is added to `gate`.
    pub fn gated(dimension: usize, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(dimension)
        }
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0; self.dimension];
        let mut vocabulary = self.vocabulary.lock().unwrap();
        for token in tokens(text) {
            let next = vocabulary.len();
            let axis = *vocabulary.entry(token).or_insert(next) % self.dimension;
            vector[axis] += 1.0;
        }
        Embedding::new(vector)
    }
}

#[async_trait]
impl EmbeddingService for VocabularyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model(&self) -> &str {
        "vocabulary"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

enum Fault {
    WrongDimension(usize),
    NonFinite,
    FailFirst(usize),
    Always,
}

/// Embedder that misbehaves in a configurable way.
pub struct FlakyEmbedder {
    dimension: usize,
    fault: Fault,
    calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn wrong_dimension(declared: usize, actual: usize) -> Self {
        Self::with_fault(declared, Fault::WrongDimension(actual))
    }

    pub fn non_finite(dimension: usize) -> Self {
        Self::with_fault(dimension, Fault::NonFinite)
    }

    pub fn failing_first(dimension: usize, failures: usize) -> Self {
        Self::with_fault(dimension, Fault::FailFirst(failures))
    }

    pub fn unavailable(dimension: usize) -> Self {
        Self::with_fault(dimension, Fault::Always)
    }

    fn with_fault(dimension: usize, fault: Fault) -> Self {
        Self {
            dimension,
            fault,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for FlakyEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let vector = match self.fault {
            Fault::WrongDimension(actual) => vec![1.0; actual],
            Fault::NonFinite => vec![f32::NAN; self.dimension],
            Fault::FailFirst(n) if call < n => {
                return Err(DomainError::embedding("connection refused"))
            }
            Fault::FailFirst(_) => vec![1.0; self.dimension],
            Fault::Always => return Err(DomainError::embedding("connection refused")),
        };
        Ok(texts.iter().map(|_| Embedding::new(vector.clone())).collect())
    }

    fn model(&self) -> &str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Completion model returning scripted responses and recording every prompt.
pub struct ScriptedLlm {
    responses: Mutex<Vec<Result<String, DomainError>>>,
    fallback: String,
    delay: Option<Duration>,
    prompts: Mutex<Vec<(String, CompletionParams)>>,
}

impl ScriptedLlm {
    pub fn answering(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response.into(),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Responses are consumed in order before falling back.
    pub fn with_script(self, script: Vec<Result<String, DomainError>>) -> Self {
        *self.responses.lock().unwrap() = script.into_iter().rev().collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<(String, CompletionParams)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, DomainError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), *params));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.responses.lock().unwrap().pop();
        scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Single-document index with one chunk per vector.
pub fn sample_index(vectors: Vec<Vec<f32>>) -> VectorIndex {
    let document_id = Uuid::new_v4();
    let dimension = vectors.first().map_or(0, Vec::len);
    let chunks = (0..vectors.len())
        .map(|i| Chunk {
            index: i,
            start: i * 10,
            end: i * 10 + 10,
            text: format!("chunk {i}"),
            document_id,
        })
        .collect();
    VectorIndex::new(
        document_id,
        "sample.txt",
        IndexTag::new("test", dimension),
        chunks,
        vectors.into_iter().map(Embedding::new).collect(),
    )
    .unwrap()
}
