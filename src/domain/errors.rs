use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Generation timed out after {0}s; try retrieving fewer chunks to reduce the prompt size")]
    GenerationTimeout(u64),

    #[error("No index has been built; process a document first")]
    IndexNotBuilt,

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Incompatible index: {0}")]
    IncompatibleIndex(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::GenerationUnavailable(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::IncompatibleIndex(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// External dependency failures that may clear up on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable(_) | Self::GenerationUnavailable(_)
        )
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration(_) => "invalid_configuration",
            Self::InvalidInput(_) => "invalid_input",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
            Self::GenerationUnavailable(_) => "generation_unavailable",
            Self::GenerationTimeout(_) => "generation_timeout",
            Self::IndexNotBuilt => "index_not_built",
            Self::NotReady(_) => "not_ready",
            Self::IncompatibleIndex(_) => "incompatible_index",
            Self::Storage(_) => "storage",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_external_failures_are_retryable() {
        assert!(DomainError::embedding("down").is_retryable());
        assert!(DomainError::generation("502").is_retryable());
        assert!(!DomainError::GenerationTimeout(30).is_retryable());
        assert!(!DomainError::invalid_config("overlap").is_retryable());
        assert!(!DomainError::IndexNotBuilt.is_retryable());
    }

    #[test]
    fn test_timeout_message_suggests_fewer_chunks() {
        let msg = DomainError::GenerationTimeout(30).to_string();
        assert!(msg.contains("30s"));
        assert!(msg.contains("fewer chunks"));
    }
}
