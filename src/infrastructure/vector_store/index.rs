use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Chunk, DomainError, Embedding, Result, SearchResult};

/// Identity of the embedding space an index was built in. Vectors from
/// different tags must never be compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTag {
    pub model: String,
    pub dimension: usize,
}

impl IndexTag {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }
}

/// Exhaustive cosine-similarity index over one document's chunks.
///
/// Row `i` holds the chunk with sequence index `i` and its vector. The index is
/// immutable once constructed; a new document means a new index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub(super) document_id: Uuid,
    pub(super) document_name: String,
    pub(super) tag: IndexTag,
    pub(super) chunks: Vec<Chunk>,
    pub(super) vectors: Vec<Embedding>,
    pub(super) created_at: DateTime<Utc>,
}

impl VectorIndex {
    pub fn new(
        document_id: Uuid,
        document_name: impl Into<String>,
        tag: IndexTag,
        chunks: Vec<Chunk>,
        vectors: Vec<Embedding>,
    ) -> Result<Self> {
        let index = Self {
            document_id,
            document_name: document_name.into(),
            tag,
            chunks,
            vectors,
            created_at: Utc::now(),
        };
        index.validate()?;
        Ok(index)
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.chunks.len() != self.vectors.len() {
            return Err(DomainError::incompatible(format!(
                "{} chunks but {} vectors",
                self.chunks.len(),
                self.vectors.len()
            )));
        }

        for (position, (chunk, vector)) in self.chunks.iter().zip(&self.vectors).enumerate() {
            if chunk.index != position {
                return Err(DomainError::incompatible(format!(
                    "chunk at row {position} has sequence index {}",
                    chunk.index
                )));
            }
            if chunk.document_id != self.document_id {
                return Err(DomainError::incompatible(format!(
                    "chunk {position} belongs to document {}",
                    chunk.document_id
                )));
            }
            if vector.dimension() != self.tag.dimension {
                return Err(DomainError::incompatible(format!(
                    "vector {position} has dimension {}, index expects {}",
                    vector.dimension(),
                    self.tag.dimension
                )));
            }
        }

        Ok(())
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn tag(&self) -> &IndexTag {
        &self.tag
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn ensure_compatible(&self, expected: &IndexTag) -> Result<()> {
        if &self.tag != expected {
            return Err(DomainError::incompatible(format!(
                "index was built with {} (dimension {}), current model is {} (dimension {})",
                self.tag.model, self.tag.dimension, expected.model, expected.dimension
            )));
        }
        Ok(())
    }

    /// Returns the `k` chunks most similar to `query`, best first.
    ///
    /// Equal scores are ordered by sequence index so earlier text wins. When
    /// the index holds fewer than `k` chunks, all of them are returned.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>> {
        if query.dimension() != self.tag.dimension {
            return Err(DomainError::incompatible(format!(
                "query has dimension {}, index expects {}",
                query.dimension(),
                self.tag.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, vector)| (i, query.cosine_similarity(vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| SearchResult {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }
}
