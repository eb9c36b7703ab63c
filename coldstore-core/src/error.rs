//! Error types for ColdStore

use thiserror::Error;

/// Result type alias for ColdStore operations
pub type Result<T> = std::result::Result<T, ColdStoreError>;

/// ColdStore error types
#[derive(Error, Debug)]
pub enum ColdStoreError {
    /// No algorithm is registered under this name
    #[error("Compression algorithm not found: {0}")]
    AlgorithmNotFound(String),

    /// Buffer carries the frame magic but the frame is malformed
    #[error("Frame parse error: {0}")]
    FrameParse(String),

    /// Background job queue rejected the job
    #[error("Compression queue is full")]
    QueueFull,

    /// Unrecognized configuration option
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// An algorithm failed to compress or decompress
    #[error("{algorithm} failed: {message}")]
    Compression { algorithm: String, message: String },

    /// Background compression is disabled or already shut down
    #[error("Background compression worker is not running")]
    WorkerStopped,

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report or metrics serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ColdStoreError {
    /// Build a compression error for the given algorithm
    pub fn compression(algorithm: &str, message: impl ToString) -> Self {
        ColdStoreError::Compression {
            algorithm: algorithm.to_string(),
            message: message.to_string(),
        }
    }

    /// Check if the caller may retry after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(self, ColdStoreError::QueueFull | ColdStoreError::Io(_))
    }

    /// Check if error indicates a corrupt or foreign frame
    pub fn is_corruption(&self) -> bool {
        matches!(self, ColdStoreError::FrameParse(_))
    }
}

impl From<serde_json::Error> for ColdStoreError {
    fn from(e: serde_json::Error) -> Self {
        ColdStoreError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ColdStoreError::QueueFull.is_retryable());
        assert!(!ColdStoreError::AlgorithmNotFound("brotli".into()).is_retryable());
        assert!(ColdStoreError::FrameParse("bad magic".into()).is_corruption());
        assert!(!ColdStoreError::QueueFull.is_corruption());
    }

    #[test]
    fn test_compression_error_message() {
        let err = ColdStoreError::compression("zstd", "truncated input");
        assert_eq!(err.to_string(), "zstd failed: truncated input");
    }
}
