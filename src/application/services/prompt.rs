use crate::domain::{Answer, SearchResult};

pub const DEFAULT_REFUSAL: &str = "The document does not contain information about this topic.";

/// `{refusal}` is replaced with the refusal sentence.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a precise assistant that answers ONLY from the provided document context.

RULES:
1. Use ONLY the information in the context below. Never use outside knowledge or make assumptions.
2. When the context contains the answer, quote the supporting text and cite the marker of the chunk it comes from, for example [Chunk 3].
3. When the context does not contain the answer, reply with exactly this sentence and nothing else: \"{refusal}\"";

const MARKER_PREFIX: &str = "[Chunk ";

pub fn citation_marker(index: usize) -> String {
    format!("{MARKER_PREFIX}{index}]")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposedPrompt {
    /// Prompt for the generator, with the supplied chunks inlined.
    Grounded { prompt: String },
    /// Nothing to ground on; answer with the refusal sentence directly.
    Refusal,
}

#[derive(Debug, Clone)]
pub struct PromptComposer {
    instructions: String,
    refusal: String,
}

impl PromptComposer {
    pub fn new(instructions: impl Into<String>, refusal: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            refusal: refusal.into(),
        }
    }

    pub fn refusal(&self) -> &str {
        &self.refusal
    }

    pub fn compose(&self, question: &str, retrieved: &[SearchResult]) -> ComposedPrompt {
        if retrieved.is_empty() {
            return ComposedPrompt::Refusal;
        }

        let context = retrieved
            .iter()
            .map(|r| format!("{}\n{}", citation_marker(r.chunk.index), r.chunk.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "{}\n\nContext from the document:\n{}\n\nQuestion: {}\n\nAnswer (using ONLY the context above):",
            self.instructions.replace("{refusal}", &self.refusal),
            context,
            question.trim()
        );

        ComposedPrompt::Grounded { prompt }
    }

    /// Turns raw generator output into an [`Answer`].
    ///
    /// Output that is just the refusal sentence (ignoring case, quotes and
    /// the final period) collapses to exactly that sentence with no
    /// citations. Otherwise citations are the supplied
    /// chunks the answer mentions, or all supplied chunks if it names none.
    pub fn interpret(&self, raw: &str, sources: Vec<SearchResult>) -> Answer {
        let text = raw.trim();
        if text.is_empty() || self.is_refusal(text) {
            return Answer::refusal(&self.refusal);
        }

        let supplied: Vec<usize> = sources.iter().map(|s| s.chunk.index).collect();
        let mut citations: Vec<usize> = Vec::new();
        for index in parse_markers(text) {
            if supplied.contains(&index) && !citations.contains(&index) {
                citations.push(index);
            }
        }
        if citations.is_empty() {
            citations = supplied;
        }

        Answer {
            answer: text.to_string(),
            citations,
            sources,
            refused: false,
        }
    }

    fn is_refusal(&self, text: &str) -> bool {
        let sentence = normalize_sentence(&self.refusal);
        !sentence.is_empty() && normalize_sentence(text) == sentence
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTIONS, DEFAULT_REFUSAL)
    }
}

fn normalize_sentence(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim()
        .trim_end_matches('.')
        .to_lowercase()
}

/// Chunk indexes named by `[Chunk N]` markers, in order of appearance.
fn parse_markers(text: &str) -> Vec<usize> {
    text.match_indices(MARKER_PREFIX)
        .filter_map(|(pos, _)| {
            let rest = &text[pos + MARKER_PREFIX.len()..];
            let (digits, tail) = rest.split_at(rest.find(|c: char| !c.is_ascii_digit())?);
            if digits.is_empty() || !tail.starts_with(']') {
                return None;
            }
            digits.parse().ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Chunk;
    use uuid::Uuid;

    fn retrieved(chunks: &[(usize, &str)]) -> Vec<SearchResult> {
        chunks
            .iter()
            .map(|(index, text)| SearchResult {
                chunk: Chunk {
                    index: *index,
                    start: 0,
                    end: text.chars().count(),
                    text: text.to_string(),
                    document_id: Uuid::nil(),
                },
                score: 0.5,
            })
            .collect()
    }

    #[test]
    fn test_compose_labels_chunks_and_states_rules() {
        let composer = PromptComposer::default();
        let sources = retrieved(&[(4, "Softmax yields probabilities."), (1, "Logits are raw scores.")]);

        let ComposedPrompt::Grounded { prompt } = composer.compose("What is softmax?", &sources)
        else {
            panic!("expected a grounded prompt");
        };

        assert!(prompt.contains("[Chunk 4]\nSoftmax yields probabilities."));
        assert!(prompt.contains("[Chunk 1]\nLogits are raw scores."));
        assert!(prompt.find("[Chunk 4]") < prompt.find("[Chunk 1]"));
        assert!(prompt.contains("Use ONLY the information"));
        assert!(prompt.contains("quote the supporting text"));
        assert!(prompt.contains(DEFAULT_REFUSAL));
        assert!(!prompt.contains("{refusal}"));
        assert!(prompt.contains("Question: What is softmax?"));
    }

    #[test]
    fn test_compose_without_chunks_refuses() {
        let composer = PromptComposer::default();
        assert_eq!(composer.compose("anything", &[]), ComposedPrompt::Refusal);
    }

    #[test]
    fn test_interpret_collects_mentioned_citations() {
        let composer = PromptComposer::default();
        let sources = retrieved(&[(2, "a"), (5, "b"), (7, "c")]);

        let answer = composer.interpret(
            "\"b\" [Chunk 5], see also [Chunk 2] and [Chunk 5] and [Chunk 9]",
            sources,
        );

        assert!(!answer.refused);
        assert_eq!(answer.citations, vec![5, 2]);
        assert_eq!(answer.sources.len(), 3);
    }

    #[test]
    fn test_interpret_without_markers_cites_all_sources() {
        let composer = PromptComposer::default();
        let answer = composer.interpret("It is b.", retrieved(&[(2, "a"), (5, "b")]));
        assert_eq!(answer.citations, vec![2, 5]);
    }

    #[test]
    fn test_interpret_normalizes_refusals() {
        let composer = PromptComposer::default();
        for raw in [
            "the document does not contain information about this topic",
            "  \"The document does not contain information about this topic.\"\n",
        ] {
            let answer = composer.interpret(raw, retrieved(&[(0, "a")]));

            assert!(answer.refused, "{raw:?}");
            assert_eq!(answer.answer, DEFAULT_REFUSAL);
            assert!(answer.citations.is_empty());
            assert!(answer.sources.is_empty());
        }
    }

    #[test]
    fn test_grounded_answer_mentioning_refusal_keeps_citations() {
        let composer = PromptComposer::default();
        let raw = "\"Softmax yields probabilities\" [Chunk 4]. The document does not contain \
                   information about this topic beyond that definition.";

        let answer = composer.interpret(raw, retrieved(&[(4, "Softmax yields probabilities.")]));

        assert!(!answer.refused);
        assert_eq!(answer.answer, raw);
        assert_eq!(answer.citations, vec![4]);
        assert_eq!(answer.sources.len(), 1);
    }

    #[test]
    fn test_parse_markers() {
        assert_eq!(parse_markers("[Chunk 12] and [Chunk 3]"), vec![12, 3]);
        assert!(parse_markers("[Chunk ] [Chunk x] [Chunk 4").is_empty());
    }
}
