/// Loader-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to decode document: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, LoadError>;
