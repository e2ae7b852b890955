use std::ops::Range;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, Result};

/// Namespace for content-derived document ids.
const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_8d4a_4c1e_9a53_0e2d_7b61_c4f8);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub text: String,
}

impl Document {
    /// Creates a document whose id is derived from its text, so the same
    /// content always maps to the same id.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v5(&DOCUMENT_NAMESPACE, text.as_bytes()),
            name: name.into(),
            text,
        }
    }
}

/// A contiguous slice of a document's text. Spans are in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub document_id: Uuid,
}

impl Chunk {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// Number of characters shared with `other`'s span.
    pub fn overlap_with(&self, other: &Chunk) -> usize {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        end.saturating_sub(start)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Sliding-window splitter producing overlapping, size-bounded chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(DomainError::invalid_config("chunk size must be positive"));
        }
        if overlap >= size {
            return Err(DomainError::invalid_config(format!(
                "chunk overlap ({overlap}) must be less than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` with stride `size - overlap`.
    ///
    /// Every chunk after the first starts with the last `overlap` characters of
    /// its predecessor. The window stops once it reaches the end of the text, so
    /// only the final chunk can be shorter than `size`.
    pub fn split(&self, document_id: Uuid, text: &str) -> Vec<Chunk> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = boundaries.len() - 1;
        let stride = self.size - self.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let end = (start + self.size).min(total);
            chunks.push(Chunk {
                index: chunks.len(),
                start,
                end,
                text: text[boundaries[start]..boundaries[end]].to_string(),
                document_id,
            });

            if end == total {
                break;
            }
            start += stride;
        }

        chunks
    }
}
