// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Worker invocation failed for chunk {chunk_id}: {reason}")]
    InvocationFailure { chunk_id: usize, reason: String },

    #[error("Worker invocation for chunk {chunk_id} timed out after {timeout_ms} ms")]
    Timeout { chunk_id: usize, timeout_ms: u64 },

    #[error("Validation failed for chunk {chunk_id}: {reason}")]
    ValidationFailure { chunk_id: usize, reason: String },

    #[error("Chunk {chunk_id} still failing after {attempts} attempts: {reason}")]
    ExhaustedRetries {
        chunk_id: usize,
        attempts: u32,
        reason: String,
    },

    #[error("Checkpoint operation failed for {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Failures that belong to a single chunk and feed the retry path.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::InvocationFailure { .. }
                | PipelineError::Timeout { .. }
                | PipelineError::ValidationFailure { .. }
        )
    }

    pub fn chunk_id(&self) -> Option<usize> {
        match self {
            PipelineError::InvocationFailure { chunk_id, .. }
            | PipelineError::Timeout { chunk_id, .. }
            | PipelineError::ValidationFailure { chunk_id, .. }
            | PipelineError::ExhaustedRetries { chunk_id, .. } => Some(*chunk_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let timeout = PipelineError::Timeout {
            chunk_id: 3,
            timeout_ms: 30_000,
        };
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.chunk_id(), Some(3));

        let config = PipelineError::InvalidConfiguration("chunk_size must be >= 1".to_string());
        assert!(!config.is_recoverable());
        assert_eq!(config.chunk_id(), None);

        let exhausted = PipelineError::ExhaustedRetries {
            chunk_id: 7,
            attempts: 3,
            reason: "empty payload".to_string(),
        };
        assert!(!exhausted.is_recoverable());
        assert!(exhausted.to_string().contains("after 3 attempts"));
    }
}
