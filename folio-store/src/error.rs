/// Storage-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("migration failed: {0}")]
    Migration(String),
    #[error("vector blob shape mismatch: expected {expected} bytes for dim {dim}, got {actual}")]
    BlobShapeMismatch {
        dim: usize,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;
