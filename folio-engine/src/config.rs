//! `FolioConfig` and its nested configuration groups: the single
//! constructor input to [`crate::FolioEngine::open`].

use std::path::PathBuf;

/// The engine converts a token budget to characters at this ratio when the
/// chunker needs character counts.
pub const CHARS_PER_TOKEN: f64 = 3.6;

#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub max_tokens_per_chunk: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: 650,
            overlap_tokens: 80,
        }
    }
}

impl ChunkConfig {
    pub fn to_chunker_config(self) -> folio_ingest::ChunkerConfig {
        folio_ingest::ChunkerConfig {
            max_chars: ((self.max_tokens_per_chunk as f64) * CHARS_PER_TOKEN) as usize,
            overlap_chars: ((self.overlap_tokens as f64) * CHARS_PER_TOKEN) as usize,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    pub use_contextual_prefix: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            use_contextual_prefix: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HybridConfig {
    pub w_bm25: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self { w_bm25: 0.5 }
    }
}

#[derive(Debug, Clone)]
pub struct FolioConfig {
    pub db_path: PathBuf,
    pub chunking: ChunkConfig,
    pub indexing: IndexConfig,
    pub hybrid: HybridConfig,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(":memory:"),
            chunking: ChunkConfig::default(),
            indexing: IndexConfig::default(),
            hybrid: HybridConfig::default(),
        }
    }
}

impl FolioConfig {
    /// A thin platform-path helper: `<application support dir>/Folio/folio.sqlite`.
    /// Deliberately minimal — a container wrapper, not deep path logic.
    pub fn application_support() -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            db_path: base.join("Library/Application Support/Folio/folio.sqlite"),
            ..Self::default()
        }
    }

    /// An alternate shared-container path keyed by a caller-chosen id.
    pub fn shared_container(id: &str) -> Self {
        let base = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            db_path: base.join(format!("Library/Group Containers/{id}/Folio/folio.sqlite")),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }
}
