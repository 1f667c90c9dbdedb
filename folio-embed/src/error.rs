/// Embedder-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding provider failed: {0}")]
    Provider(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding count mismatch: expected {expected} vectors, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EmbedError>;
