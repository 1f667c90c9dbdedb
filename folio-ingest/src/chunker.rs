//! The `Chunker` contract (component C8) plus a default token-budget
//! chunker with overlap, operating on characters (the engine converts
//! token counts to characters at ~3.6 chars/token per its config).

use folio_model::{ChunkDraft, LoadedDocument, SourceId};

/// Character-based chunk sizing. `overlap_chars` is clamped below
/// `max_chars` so chunking always makes forward progress.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 2340,
            overlap_chars: 288,
        }
    }
}

pub trait Chunker: Send + Sync {
    fn chunk(&self, source_id: &SourceId, doc: &LoadedDocument, config: &ChunkerConfig) -> Vec<ChunkDraft>;
}

/// Prefers cutting at a paragraph break, then a sentence end, only falling
/// back to a hard character cut when neither is found past the midpoint of
/// the budget. Each chunk after the first overlaps the previous one by
/// `overlap_chars` so context is not lost at a cut.
#[derive(Debug, Default)]
pub struct DefaultChunker;

impl Chunker for DefaultChunker {
    fn chunk(&self, source_id: &SourceId, doc: &LoadedDocument, config: &ChunkerConfig) -> Vec<ChunkDraft> {
        let mut drafts = Vec::new();
        for page in &doc.pages {
            for text in split_with_overlap(&page.text, config.max_chars, config.overlap_chars) {
                drafts.push(ChunkDraft {
                    source_id: source_id.clone(),
                    page: Some(page.index),
                    text,
                });
            }
        }
        drafts
    }
}

fn split_with_overlap(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    let overlap_chars = overlap_chars.min(max_chars.saturating_sub(1));

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < len {
        let hard_end = (start + max_chars).min(len);
        let cut = if hard_end == len {
            len
        } else {
            best_boundary(&chars, start, hard_end).unwrap_or(hard_end)
        };

        let segment: String = chars[start..cut].iter().collect();
        let trimmed = segment.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }

        if cut >= len {
            break;
        }
        start = cut.saturating_sub(overlap_chars).max(start + 1);
    }
    out
}

/// Finds the rightmost paragraph break, else sentence end, at or after the
/// midpoint of `[start, hard_end)`. Returns the index just past the
/// boundary character.
fn best_boundary(chars: &[char], start: usize, hard_end: usize) -> Option<usize> {
    let lo = start + (hard_end - start) / 2;

    for i in (lo..hard_end).rev() {
        if chars[i] == '\n' && i > 0 && chars[i - 1] == '\n' {
            return Some(i + 1);
        }
    }

    for i in (lo..hard_end).rev() {
        if matches!(chars[i], '.' | '!' | '?') {
            let followed_by_space = chars.get(i + 1).map(|c| c.is_whitespace()).unwrap_or(true);
            if followed_by_space {
                return Some(i + 1);
            }
        }
    }

    None
}
