//! The Folio retrieval engine: ingest orchestration, BM25/hybrid search,
//! neighbor-expanded passage assembly, and document slicing, wired over
//! `folio-store`, `folio-embed`, and `folio-ingest`.

pub mod config;
pub mod contextualizer;
pub mod engine;
pub mod error;
pub mod prefix_fn;

pub use config::{ChunkConfig, FolioConfig, HybridConfig, IndexConfig};
pub use engine::FolioEngine;
pub use error::{EngineError, Result};
pub use prefix_fn::PrefixFn;
