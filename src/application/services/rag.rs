use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::embedding::EmbeddingGateway;
use crate::domain::{Chunk, Chunker, Document, DomainError, Result, SearchResult};
use crate::infrastructure::vector_store::{IndexTag, VectorIndex};

/// Builds per-document indexes and turns questions into ranked chunk sets.
pub struct RagService {
    embedding: Arc<EmbeddingGateway>,
    chunker: Chunker,
    default_top_k: usize,
    min_score: f32,
    dedup_overlap_ratio: f32,
}

impl RagService {
    pub fn new(embedding: Arc<EmbeddingGateway>, chunker: Chunker, default_top_k: usize) -> Self {
        Self {
            embedding,
            chunker,
            default_top_k,
            min_score: 0.0,
            dedup_overlap_ratio: 0.5,
        }
    }

    /// Results scoring at or below `min_score` are not considered support.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// A result is dropped when more than this fraction of its span is
    /// already covered by a better-ranked result. `1.0` disables the check.
    pub fn with_dedup_overlap_ratio(mut self, ratio: f32) -> Self {
        self.dedup_overlap_ratio = ratio;
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    pub fn tag(&self) -> IndexTag {
        IndexTag::new(self.embedding.model(), self.embedding.dimension())
    }

    #[instrument(skip(self, document), fields(document_id = %document.id, name = %document.name))]
    pub async fn index_document(&self, document: &Document) -> Result<VectorIndex> {
        let chunks = self.chunker.split(document.id, &document.text);
        self.build_index(document.id, &document.name, chunks).await
    }

    /// Embeds all chunks in batches and assembles the index. Nothing is
    /// returned unless every chunk received a vector.
    #[instrument(skip(self, name, chunks), fields(count = chunks.len()))]
    pub async fn build_index(
        &self,
        document_id: Uuid,
        name: &str,
        chunks: Vec<Chunk>,
    ) -> Result<VectorIndex> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedding.embed(&texts).await?;

        let index = VectorIndex::new(document_id, name, self.tag(), chunks, vectors)?;
        info!(chunks = index.len(), model = %index.tag().model, "index built");
        Ok(index)
    }

    #[instrument(skip(self, index))]
    pub async fn retrieve(&self, index: &VectorIndex, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve_top_k(index, query, self.default_top_k).await
    }

    /// Embeds `query` and returns up to `top_k` supporting chunks, best first.
    #[instrument(skip(self, index))]
    pub async fn retrieve_top_k(
        &self,
        index: &VectorIndex,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(DomainError::invalid_input("top_k must be greater than zero"));
        }
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embedding.embed_query(query).await?;
        let results = index.search(&embedding, top_k)?;
        let ranked = results.len();

        let relevant: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| r.score > self.min_score)
            .collect();
        let kept = suppress_near_duplicates(relevant, self.dedup_overlap_ratio);

        tracing::debug!(ranked, kept = kept.len(), "retrieval completed");
        Ok(kept)
    }
}

/// Drops results whose span is mostly covered by an earlier (better) one.
fn suppress_near_duplicates(results: Vec<SearchResult>, max_ratio: f32) -> Vec<SearchResult> {
    let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());

    for result in results {
        let len = result.chunk.char_len().max(1) as f32;
        let duplicate = kept.iter().any(|k| {
            let shared = result.chunk.overlap_with(&k.chunk) as f32;
            shared / len > max_ratio
        });
        if !duplicate {
            kept.push(result);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::retry::RetryPolicy;
    use crate::test_support::{FlakyEmbedder, VocabularyEmbedder};

    fn service(chunk_size: usize, overlap: usize) -> RagService {
        let gateway = EmbeddingGateway::new(Arc::new(VocabularyEmbedder::new(256)));
        RagService::new(
            Arc::new(gateway),
            Chunker::new(chunk_size, overlap).unwrap(),
            4,
        )
    }

    fn result(index: usize, start: usize, end: usize, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                index,
                start,
                end,
                text: String::new(),
                document_id: Uuid::nil(),
            },
            score,
        }
    }

    #[tokio::test]
    async fn test_index_and_retrieve_exact_match() {
        let rag = service(60, 10);
        let doc = Document::new(
            "facts.txt",
            "Rust guarantees memory safety without garbage collection. \
             Tokio provides an asynchronous runtime for network services. \
             Serde serializes structures into many data formats.",
        );

        let index = rag.index_document(&doc).await.unwrap();
        assert!(index.len() >= 3);

        let results = rag.retrieve(&index, "asynchronous runtime").await.unwrap();
        assert!(!results.is_empty());
        assert!(results[0].chunk.text.contains("asynchronous runtime"));
    }

    #[tokio::test]
    async fn test_unrelated_question_retrieves_nothing() {
        let rag = service(40, 10);
        let doc = Document::new(
            "softmax.txt",
            "The softmax function converts logits into probabilities that sum to one.",
        );
        let index = rag.index_document(&doc).await.unwrap();

        let results = rag.retrieve(&index, "What is quantum computing?").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_builds_empty_index() {
        let rag = service(40, 10);
        let index = rag.index_document(&Document::new("empty.txt", "")).await.unwrap();

        assert!(index.is_empty());
        assert!(rag.retrieve(&index, "anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_embedding_builds_nothing() {
        let gateway = EmbeddingGateway::new(Arc::new(FlakyEmbedder::unavailable(4)))
            .with_retry(RetryPolicy::none());
        let rag = RagService::new(Arc::new(gateway), Chunker::new(10, 2).unwrap(), 4);

        let result = rag.index_document(&Document::new("doc", "some text here")).await;
        assert!(matches!(result, Err(DomainError::EmbeddingUnavailable(_))));
    }

    #[test]
    fn test_near_duplicates_are_suppressed() {
        let results = vec![
            result(3, 30, 70, 0.9),
            result(4, 35, 75, 0.8),
            result(1, 20, 60, 0.7),
            result(8, 80, 120, 0.6),
        ];

        let kept = suppress_near_duplicates(results, 0.5);
        let order: Vec<usize> = kept.iter().map(|r| r.chunk.index).collect();

        assert_eq!(order, vec![3, 8]);
    }

    #[test]
    fn test_neighbouring_windows_survive_default_ratio() {
        let results = vec![result(0, 0, 40, 0.9), result(1, 30, 70, 0.8)];
        assert_eq!(suppress_near_duplicates(results, 0.5).len(), 2);
    }
}
