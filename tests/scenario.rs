mod common;

use std::sync::Arc;

use common::{pipeline, ExtractiveLlm, HANDBOOK, SOFTMAX};
use docqa::application::services::{Phase, Session, DEFAULT_REFUSAL};
use docqa::domain::{Chunker, Document, DomainError};

#[tokio::test]
async fn softmax_question_is_answered_from_first_chunk() {
    let llm = Arc::new(ExtractiveLlm::default());
    let session = Session::new(pipeline(40, 10, llm.clone()));

    let status = session
        .process_document(Document::new("softmax.txt", SOFTMAX))
        .await
        .unwrap();
    assert_eq!(status.phase, Phase::Ready);
    assert_eq!(status.chunk_count, 3);

    let answer = session.ask("What is softmax?").await.unwrap();

    assert!(!answer.refused);
    assert_eq!(answer.citations, vec![0]);
    assert!(answer.answer.contains("softmax function"));
    assert!(answer.answer.contains("[Chunk 0]"));
    assert_eq!(answer.sources[0].chunk.start, 0);
    assert_eq!(answer.sources[0].chunk.end, 40);
}

#[tokio::test]
async fn unrelated_question_gets_exact_refusal() {
    let llm = Arc::new(ExtractiveLlm::default());
    let session = Session::new(pipeline(40, 10, llm.clone()));
    session
        .process_document(Document::new("softmax.txt", SOFTMAX))
        .await
        .unwrap();

    let answer = session.ask("What is quantum computing?").await.unwrap();

    assert!(answer.refused);
    assert_eq!(answer.answer, DEFAULT_REFUSAL);
    assert!(answer.citations.is_empty());
    assert!(llm.prompts().is_empty());
}

#[tokio::test]
async fn each_fact_is_retrieved_for_its_question() {
    let llm = Arc::new(ExtractiveLlm::default());
    let session = Session::new(pipeline(90, 20, llm));
    session
        .process_document(Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    let cases = [
        ("What does the borrow checker enforce?", "borrow checker"),
        ("Which package manager resolves dependencies?", "package manager"),
        ("What is Tokio?", "Tokio"),
        ("Which serialization frameworks exist?", "serialization"),
        ("What records structured diagnostics?", "structured diagnostics"),
    ];

    for (question, expected) in cases {
        let answer = session.ask(question).await.unwrap();
        assert!(!answer.refused, "{question} was refused");
        assert!(
            answer.sources.iter().any(|s| s.chunk.text.contains(expected)),
            "{question}: no retrieved chunk contains {expected:?}"
        );
        assert!(answer.answer.contains(expected), "{question}: {}", answer.answer);
    }

    assert_eq!(session.history().unwrap().len(), cases.len());
}

#[tokio::test]
async fn rebuilding_the_same_document_is_idempotent() {
    let pipeline = pipeline(90, 20, Arc::new(ExtractiveLlm::default()));
    let document = Document::new("handbook.txt", HANDBOOK);

    let first = pipeline.rag.index_document(&document).await.unwrap();
    let second = pipeline
        .rag
        .index_document(&Document::new("copy.txt", HANDBOOK))
        .await
        .unwrap();

    assert_eq!(first.document_id(), second.document_id());
    assert_eq!(first.chunks(), second.chunks());

    let a = pipeline.rag.retrieve(&first, "asynchronous runtime").await.unwrap();
    let b = pipeline.rag.retrieve(&second, "asynchronous runtime").await.unwrap();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.chunk.index, y.chunk.index);
        assert_eq!(x.score, y.score);
    }
}

#[tokio::test]
async fn persisted_index_answers_like_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let location = dir.path().join("handbook");
    // Both sessions share one embedder, so vocabulary axes line up.
    let pipeline = pipeline(90, 20, Arc::new(ExtractiveLlm::default()));

    let original = Session::new(pipeline.clone());
    original
        .process_document(Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();
    original.persist(&location).await.unwrap();

    let restored = Session::new(pipeline);
    let status = restored.restore(&location).await.unwrap();
    assert_eq!(status.phase, Phase::Ready);
    assert_eq!(status.document_name.as_deref(), Some("handbook.txt"));

    let question = "What is Tokio?";
    let before = original.ask(question).await.unwrap();
    let after = restored.ask(question).await.unwrap();

    assert_eq!(before.answer, after.answer);
    assert_eq!(before.citations, after.citations);
}

#[test]
fn default_chunking_covers_long_documents() {
    let text = HANDBOOK.repeat(12);
    let chunker = Chunker::new(1000, 200).unwrap();
    let chunks = chunker.split(uuid::Uuid::nil(), &text);

    let total = text.chars().count();
    assert_eq!(chunks.first().unwrap().start, 0);
    assert_eq!(chunks.last().unwrap().end, total);
    for pair in chunks.windows(2) {
        assert_eq!(pair[1].start, pair[0].start + 800);
    }
}

#[tokio::test]
async fn reset_returns_to_empty() {
    let session = Session::new(pipeline(40, 10, Arc::new(ExtractiveLlm::default())));
    session
        .process_document(Document::new("softmax.txt", SOFTMAX))
        .await
        .unwrap();

    session.reset().unwrap();

    assert_eq!(session.status().unwrap().phase, Phase::Empty);
    assert_eq!(
        session.ask("What is softmax?").await.unwrap_err(),
        DomainError::IndexNotBuilt
    );
}

#[tokio::test]
async fn repeated_question_cites_the_same_chunks() {
    let session = Session::new(pipeline(90, 20, Arc::new(ExtractiveLlm::default())));
    session
        .process_document(Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    let first = session.ask("Which package manager resolves dependencies?").await.unwrap();
    let second = session.ask("Which package manager resolves dependencies?").await.unwrap();

    assert_eq!(first.citations, second.citations);
    assert_eq!(first.answer, second.answer);
}
