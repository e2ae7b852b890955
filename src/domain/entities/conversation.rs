use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SearchResult;

/// Result of one question answered against the active document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Sequence indexes of the chunks that support the answer.
    pub citations: Vec<usize>,
    pub sources: Vec<SearchResult>,
    pub refused: bool,
}

impl Answer {
    pub fn refusal(sentence: impl Into<String>) -> Self {
        Self {
            answer: sentence.into(),
            citations: Vec::new(),
            sources: Vec::new(),
            refused: true,
        }
    }
}

/// One entry of a session's question log. Turns are recorded for display only
/// and are never fed back into later prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub document_id: Uuid,
    pub retrieved: Vec<usize>,
    pub citations: Vec<usize>,
    pub answer: String,
    pub refused: bool,
    pub asked_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, document_id: Uuid, answer: &Answer) -> Self {
        Self {
            question: question.into(),
            document_id,
            retrieved: answer.sources.iter().map(|s| s.chunk.index).collect(),
            citations: answer.citations.clone(),
            answer: answer.answer.clone(),
            refused: answer.refused,
            asked_at: Utc::now(),
        }
    }
}
