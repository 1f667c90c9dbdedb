//! Shared record types used across the Folio crates.
//!
//! Mirrors the shape of a chunk-model crate: plain data, no I/O, no
//! storage-engine or embedding-backend dependencies.

use std::fmt;

/// Opaque, caller-chosen identifier for a [`Source`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        SourceId(s.to_string())
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        SourceId(s)
    }
}

/// Stable, generated identifier for a [`Chunk`] row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(pub String);

impl ChunkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        ChunkId(s)
    }
}

/// Logical document grouping (data model §3, "Source").
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: SourceId,
    pub display_name: String,
    pub file_path: String,
    pub pages: i64,
    pub chunks: i64,
    pub imported_at: String,
}

/// A unit of retrieval (data model §3, "Chunk").
///
/// `ordinal` is the monotonically increasing row ordinal assigned at insert
/// time; it defines adjacency order for neighbor expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub source_id: SourceId,
    pub ordinal: i64,
    pub page: Option<i64>,
    pub content: String,
    /// Contextual prefix; empty string when augmentation is disabled.
    pub section_title: String,
}

impl Chunk {
    /// The augmented text indexed for lexical search and embedded for cosine
    /// search: `section_title + content`.
    pub fn augmented_text(&self) -> String {
        format!("{}{}", self.section_title, self.content)
    }
}

/// A raw chunk as produced by a [`Chunker`](crate) implementation, before a
/// row ordinal or id has been assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub source_id: SourceId,
    pub page: Option<i64>,
    pub text: String,
}

/// A single FTS probe result (C2 `ftsHits`).
#[derive(Debug, Clone, PartialEq)]
pub struct FtsHit {
    pub ordinal: i64,
    pub chunk_id: ChunkId,
    pub source_id: SourceId,
    pub page: Option<i64>,
    pub excerpt: String,
    /// Raw FTS5 BM25 score; lower is better.
    pub bm25: f64,
}

/// A passage assembled by neighbor-window expansion (C6).
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    pub source_id: SourceId,
    pub start_page: Option<i64>,
    pub end_page: Option<i64>,
    pub bm25: f64,
    pub cosine: Option<f64>,
    pub fused: Option<f64>,
}

/// A coherent slice of a source, as returned by `fetchDocument` (C6).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSlice {
    pub source_id: SourceId,
    pub display_name: String,
    pub text: String,
    pub start_page: Option<i64>,
    pub end_page: Option<i64>,
}

impl DocumentSlice {
    pub fn empty(source_id: SourceId, display_name: String) -> Self {
        Self {
            source_id,
            display_name,
            text: String::new(),
            start_page: None,
            end_page: None,
        }
    }
}

/// A single page of loaded document text (C8, `Loader`).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    pub index: i64,
    pub text: String,
}

/// The result of loading a document (C8, `Loader`).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub name: String,
    pub pages: Vec<LoadedPage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn augmented_text_concatenates_prefix_and_content() {
        let chunk = Chunk {
            id: ChunkId("c1".into()),
            source_id: SourceId("s1".into()),
            ordinal: 0,
            page: Some(1),
            content: "hello world".into(),
            section_title: "[doc, p.1] ".into(),
        };
        assert_eq!(chunk.augmented_text(), "[doc, p.1] hello world");
    }

    #[test]
    fn source_id_display_round_trips() {
        let id = SourceId::from("note.txt");
        assert_eq!(id.to_string(), "note.txt");
        assert_eq!(id.as_str(), "note.txt");
    }
}
