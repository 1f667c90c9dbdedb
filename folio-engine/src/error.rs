use folio_model::SourceId;

/// Aggregated engine failures: wraps every lower-layer fault and adds the
/// input-fault cases that only the orchestrator can see.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] folio_store::StoreError),
    #[error(transparent)]
    Embed(#[from] folio_embed::EmbedError),
    #[error(transparent)]
    Load(#[from] folio_ingest::LoadError),
    #[error("no loader accepts this input")]
    NoLoader,
    #[error("unknown source id: {0}")]
    UnknownSource(SourceId),
    #[error("no embedder configured")]
    NoEmbedder,
}

pub type Result<T> = std::result::Result<T, EngineError>;
