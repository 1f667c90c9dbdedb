//! `FolioEngine`: the public orchestrator wiring the store, loaders,
//! chunker, embedder, and prefix function together.
//!
//! Unlike a reopen-per-call design, which is safe only when the backing
//! file is always a real path on disk, Folio's configuration surface
//! accepts `:memory:` as a first-class database path, and a fresh
//! in-memory connection per call would discard everything already
//! ingested. `FolioEngine` therefore holds one `Mutex`-guarded
//! `FolioStore` for its lifetime.

use std::collections::HashSet;
use std::sync::Mutex;

use folio_embed::Embedder;
use folio_ingest::{Chunker, DefaultChunker, LoadInput, Loader, PdfLoader, TextLoader};
use folio_model::{DocumentSlice, Passage, Source, SourceId};
use folio_store::rank_fusion;
use folio_store::FolioStore;

use crate::config::FolioConfig;
use crate::contextualizer::heuristic_prefix;
use crate::error::{EngineError, Result};
use crate::prefix_fn::PrefixFn;

/// The assembled retrieval engine. Build with [`FolioEngine::open`] and the
/// `with_*` builder methods, then share behind an `Arc` across threads.
pub struct FolioEngine {
    store: Mutex<FolioStore>,
    loaders: Vec<Box<dyn Loader>>,
    chunker: Box<dyn Chunker>,
    embedder: Option<Box<dyn Embedder>>,
    prefix_fn: Option<Box<dyn PrefixFn>>,
    config: FolioConfig,
}

impl FolioEngine {
    /// Open (creating and migrating if necessary) the database at
    /// `config.db_path`, with the default loader chain (`TextLoader`,
    /// `PdfLoader`) and `DefaultChunker`.
    pub fn open(config: FolioConfig) -> Result<Self> {
        let path = config.db_path.to_string_lossy().into_owned();
        let store = if path == ":memory:" {
            FolioStore::open_in_memory()?
        } else {
            FolioStore::open(&path)?
        };
        Ok(Self {
            store: Mutex::new(store),
            loaders: vec![Box::new(TextLoader), Box::new(PdfLoader)],
            chunker: Box::new(DefaultChunker),
            embedder: None,
            prefix_fn: None,
            config,
        })
    }

    pub fn with_embedder(mut self, embedder: impl Embedder + 'static) -> Self {
        self.embedder = Some(Box::new(embedder));
        self
    }

    pub fn with_prefix_fn(mut self, prefix_fn: impl PrefixFn + 'static) -> Self {
        self.prefix_fn = Some(Box::new(prefix_fn));
        self
    }

    pub fn with_loaders(mut self, loaders: Vec<Box<dyn Loader>>) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn with_chunker(mut self, chunker: impl Chunker + 'static) -> Self {
        self.chunker = Box::new(chunker);
        self
    }

    // -- ingest (C7) ----------------------------------------------------

    /// Synchronous ingest: no prefix awaiting, no embedding.
    pub fn ingest(&self, path: &str, source_id: &SourceId, display_name: &str) -> Result<()> {
        let input = LoadInput::new(path);
        let loader = folio_ingest::dispatch(&self.loaders, &input).ok_or(EngineError::NoLoader)?;
        let doc = loader.load(&input)?;
        let doc = folio_ingest::strip_headers_and_footers(&doc);

        let mut store = self.store.lock().expect("store mutex poisoned");
        store.delete_chunks_for_source(source_id)?;
        store.insert_source(source_id, path, display_name, doc.pages.len() as i64, 0)?;

        let chunker_config = self.config.chunking.to_chunker_config();
        let drafts = self.chunker.chunk(source_id, &doc, &chunker_config);

        for draft in &drafts {
            let prefix = if self.config.indexing.use_contextual_prefix {
                let page_text = page_text(&doc, draft.page);
                heuristic_prefix(display_name, draft.page, page_text)
            } else {
                String::new()
            };
            let fts_content = format!("{prefix}{}", draft.text);
            store.insert(source_id, draft.page, &draft.text, &prefix, Some(&fts_content))?;
        }

        store.insert_source(source_id, path, display_name, doc.pages.len() as i64, drafts.len() as i64)?;
        Ok(())
    }

    /// Asynchronous ingest: per-chunk prefix-cache lookup, optional
    /// caller-provided (possibly blocking) prefix function, and optional
    /// inline embedding of the augmented text.
    pub fn ingest_async(&self, path: &str, source_id: &SourceId, display_name: &str) -> Result<()> {
        let input = LoadInput::new(path);
        let loader = folio_ingest::dispatch(&self.loaders, &input).ok_or(EngineError::NoLoader)?;
        let doc = loader.load(&input)?;
        let doc = folio_ingest::strip_headers_and_footers(&doc);

        let mut store = self.store.lock().expect("store mutex poisoned");
        store.delete_chunks_for_source(source_id)?;
        store.insert_source(source_id, path, display_name, doc.pages.len() as i64, 0)?;

        let chunker_config = self.config.chunking.to_chunker_config();
        let drafts = self.chunker.chunk(source_id, &doc, &chunker_config);

        for draft in &drafts {
            let prefix = if self.config.indexing.use_contextual_prefix {
                self.resolve_async_prefix(&store, source_id, display_name, &doc, draft.page, &draft.text)?
            } else {
                String::new()
            };
            let fts_content = format!("{prefix}{}", draft.text);
            let chunk_id = store.insert(source_id, draft.page, &draft.text, &prefix, Some(&fts_content))?;

            if let Some(embedder) = &self.embedder {
                let augmented = fts_content;
                let vector = embedder.embed(&augmented)?;
                store.insert_vector(&chunk_id, vector.len(), &vector)?;
            }
        }

        store.insert_source(source_id, path, display_name, doc.pages.len() as i64, drafts.len() as i64)?;
        Ok(())
    }

    /// Cache lookup, optional prefix function with fallback, sanitize,
    /// cache-on-resolution (only when a prefix function was actually
    /// consulted — see the crate's design notes on why a free heuristic
    /// computation is never cached).
    fn resolve_async_prefix(
        &self,
        store: &FolioStore,
        source_id: &SourceId,
        display_name: &str,
        doc: &folio_model::LoadedDocument,
        page: Option<i64>,
        chunk_text: &str,
    ) -> Result<String> {
        let Some(prefix_fn) = &self.prefix_fn else {
            return Ok(heuristic_prefix(display_name, page, page_text(doc, page)));
        };

        let key = folio_store::prefix_cache::cache_key(source_id.as_str(), page, chunk_text);
        if let Some(cached) = store.get_cached_prefix(&key)? {
            return Ok(cached);
        }

        let raw = prefix_fn
            .call(display_name, page, chunk_text)
            .unwrap_or_else(|_| heuristic_prefix(display_name, page, page_text(doc, page)));
        let mut sanitized = folio_store::prefix_cache::sanitize(&raw);
        if sanitized.is_empty() {
            sanitized = heuristic_prefix(display_name, page, page_text(doc, page));
        }

        let meta = serde_json::json!({"model": "user-provided", "rev": "v1", "chars": sanitized.chars().count()});
        store.put_cached_prefix(&key, &sanitized, &meta.to_string())?;
        Ok(sanitized)
    }

    /// Embed and store vectors for chunks lacking one, `batch` at a time,
    /// until none remain. Returns the total number embedded.
    pub fn backfill_embeddings(&self, source_id: Option<&SourceId>, batch: usize) -> Result<usize> {
        assert!(batch > 0, "batch must be positive");
        let embedder = self.embedder.as_deref().ok_or(EngineError::NoEmbedder)?;
        let store = self.store.lock().expect("store mutex poisoned");

        let mut total = 0usize;
        loop {
            let pending = store.chunks_without_vector(source_id, batch)?;
            if pending.is_empty() {
                break;
            }
            let chunks = store.fetch_chunks_by_ids(&pending)?;
            let augmented: Vec<String> = chunks.iter().map(|c| c.augmented_text()).collect();
            let texts: Vec<&str> = augmented.iter().map(String::as_str).collect();
            let embeddings = embedder.embed_batch(&texts)?;
            if embeddings.len() != chunks.len() {
                return Err(EngineError::Embed(folio_embed::EmbedError::CountMismatch {
                    expected: chunks.len(),
                    actual: embeddings.len(),
                }));
            }
            for (chunk, vector) in chunks.iter().zip(embeddings.iter()) {
                store.insert_vector(&chunk.id, vector.len(), vector)?;
            }
            total += chunks.len();
        }
        Ok(total)
    }

    // -- search (C6) ------------------------------------------------------

    /// Top `limit` FTS snippets, ordered by ascending BM25.
    pub fn search(&self, query: &str, source_filter: Option<&SourceId>, limit: usize) -> Result<Vec<folio_model::FtsHit>> {
        assert!(limit > 0, "limit must be positive");
        let store = self.store.lock().expect("store mutex poisoned");
        Ok(store.fts_hits(query, source_filter, limit)?)
    }

    /// BM25-only passage retrieval with neighbor-window expansion and
    /// dedup-by-ordinal.
    pub fn search_with_context(
        &self,
        query: &str,
        source_filter: Option<&SourceId>,
        limit: usize,
        expand: i64,
    ) -> Result<Vec<Passage>> {
        assert!(limit > 0, "limit must be positive");
        assert!(expand >= 0, "expand must be non-negative");

        let store = self.store.lock().expect("store mutex poisoned");
        let pool = (limit * 6).max(60);
        let hits = store.fts_hits(query, source_filter, pool)?;

        let mut used = HashSet::new();
        let mut passages = Vec::new();
        for hit in hits {
            if passages.len() >= limit {
                break;
            }
            if used.contains(&hit.ordinal) {
                continue;
            }
            let window = store.fetch_neighbors(&hit.source_id, hit.ordinal, expand)?;
            if window.is_empty() {
                continue;
            }
            for chunk in &window {
                used.insert(chunk.ordinal);
            }
            passages.push(assemble_passage(&window, &hit.source_id, hit.bm25, None, None));
        }
        Ok(passages)
    }

    /// As [`Self::search_with_context`], plus cosine re-scoring and rank
    /// fusion when an embedder is configured.
    pub fn search_hybrid(
        &self,
        query: &str,
        source_filter: Option<&SourceId>,
        limit: usize,
        expand: i64,
        w_bm25: f64,
    ) -> Result<Vec<Passage>> {
        assert!(limit > 0, "limit must be positive");
        assert!(expand >= 0, "expand must be non-negative");

        let store = self.store.lock().expect("store mutex poisoned");
        let pool = (limit * 6).max(60);
        let hits = store.fts_hits(query, source_filter, pool)?;

        let cosines: std::collections::HashMap<i64, f64> = if let Some(embedder) = &self.embedder {
            let query_vector = embedder.embed(query)?;
            let chunk_ids: Vec<_> = hits.iter().map(|h| h.chunk_id.clone()).collect();
            let vectors = store.fetch_vectors(&chunk_ids)?;
            hits.iter()
                .filter_map(|h| vectors.get(&h.chunk_id).map(|(_, v)| (h.ordinal, cosine_similarity(&query_vector, v))))
                .collect()
        } else {
            std::collections::HashMap::new()
        };

        let candidates: Vec<(i64, f64, Option<f64>)> = hits
            .iter()
            .map(|h| (h.ordinal, h.bm25, cosines.get(&h.ordinal).copied()))
            .collect();
        let ranked = rank_fusion::rank(&candidates, w_bm25);

        let hit_by_ordinal: std::collections::HashMap<i64, &folio_model::FtsHit> =
            hits.iter().map(|h| (h.ordinal, h)).collect();

        let mut used = HashSet::new();
        let mut passages = Vec::new();
        for candidate in ranked {
            if passages.len() >= limit {
                break;
            }
            if used.contains(&candidate.ordinal) {
                continue;
            }
            let Some(hit) = hit_by_ordinal.get(&candidate.ordinal) else {
                continue;
            };
            let window = store.fetch_neighbors(&hit.source_id, candidate.ordinal, expand)?;
            if window.is_empty() {
                continue;
            }
            for chunk in &window {
                used.insert(chunk.ordinal);
            }
            passages.push(assemble_passage(
                &window,
                &hit.source_id,
                candidate.bm25,
                candidate.cosine,
                Some(candidate.fused),
            ));
        }
        Ok(passages)
    }

    /// Assemble a coherent slice of a source for display or prompt
    /// grounding.
    pub fn fetch_document(
        &self,
        source_id: &SourceId,
        start_page: Option<i64>,
        anchor: Option<&str>,
        expand: i64,
        max_chars: Option<usize>,
    ) -> Result<DocumentSlice> {
        assert!((0..=8).contains(&expand), "expand must be in [0, 8] for fetchDocument");

        let store = self.store.lock().expect("store mutex poisoned");
        let source = store.fetch_source(source_id)?.ok_or_else(|| EngineError::UnknownSource(source_id.clone()))?;

        let chunks = if let Some(anchor) = anchor.map(str::trim).filter(|a| !a.is_empty()) {
            match store.find_anchor_ordinal(source_id, anchor)? {
                Some(ordinal) => store.fetch_neighbors(source_id, ordinal, expand)?,
                None => Vec::new(),
            }
        } else if let Some(start_page) = start_page {
            store.fetch_chunks_from_page(source_id, start_page)?
        } else {
            store.fetch_all_chunks(source_id)?
        };

        if chunks.is_empty() {
            return Ok(DocumentSlice::empty(source_id.clone(), source.display_name));
        }

        let text = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n");
        let text = match max_chars {
            Some(max_chars) => truncate_chars(&text, max_chars),
            None => text,
        };
        let start_page = chunks.iter().filter_map(|c| c.page).min();
        let end_page = chunks.iter().filter_map(|c| c.page).max();

        Ok(DocumentSlice {
            source_id: source_id.clone(),
            display_name: source.display_name,
            text,
            start_page,
            end_page,
        })
    }

    // -- admin -------------------------------------------------------------

    pub fn fetch_source(&self, source_id: &SourceId) -> Result<Option<Source>> {
        Ok(self.store.lock().expect("store mutex poisoned").fetch_source(source_id)?)
    }

    pub fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.store.lock().expect("store mutex poisoned").list_sources()?)
    }

    /// `(pageCount, chunkCount)` derived live from the chunk table.
    pub fn repo_counts(&self, source_id: &SourceId) -> Result<(i64, i64)> {
        Ok(self.store.lock().expect("store mutex poisoned").counts(source_id)?)
    }

    pub fn delete_source(&self, source_id: &SourceId) -> Result<()> {
        self.store.lock().expect("store mutex poisoned").delete_source(source_id)?;
        Ok(())
    }
}

fn page_text(doc: &folio_model::LoadedDocument, page: Option<i64>) -> &str {
    match page {
        Some(p) => doc
            .pages
            .iter()
            .find(|pg| pg.index == p)
            .map(|pg| pg.text.as_str())
            .unwrap_or(""),
        None => "",
    }
}

fn assemble_passage(
    window: &[folio_model::Chunk],
    source_id: &SourceId,
    bm25: f64,
    cosine: Option<f64>,
    fused: Option<f64>,
) -> Passage {
    let text = window.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n");
    let start_page = window.iter().filter_map(|c| c.page).min();
    let end_page = window.iter().filter_map(|c| c.page).max();
    Passage {
        text,
        source_id: source_id.clone(),
        start_page,
        end_page,
        bm25,
        cosine,
        fused,
    }
}

/// Cosine similarity with double-precision accumulators; a zero-magnitude
/// vector yields 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for i in 0..n {
        let x = a[i] as f64;
        let y = b[i] as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    assert!(max_chars > 0, "maxChars must be positive");
    text.chars().take(max_chars).collect()
}
