//! The sqlite-backed chunk/source/prefix-cache/vector store (components
//! C1-C4): the single type every other crate in the workspace talks to.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use folio_model::{Chunk, ChunkId, FtsHit, Source, SourceId};

use crate::error::{Result, StoreError};
use crate::migrations::open_and_migrate;
use crate::vector_codec;

pub struct FolioStore {
    conn: rusqlite::Connection,
}

impl FolioStore {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            conn: open_and_migrate(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    // -- sources (C1/C2) ---------------------------------------------------

    pub fn insert_source(
        &self,
        id: &SourceId,
        file_path: &str,
        display_name: &str,
        pages: i64,
        chunk_count: i64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sources (id, display_name, file_path, pages, chunks, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                file_path = excluded.file_path,
                pages = excluded.pages,
                chunks = excluded.chunks,
                imported_at = excluded.imported_at",
            params![
                id.as_str(),
                display_name,
                file_path,
                pages,
                chunk_count,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn fetch_source(&self, id: &SourceId) -> Result<Option<Source>> {
        self.conn
            .query_row(
                "SELECT id, display_name, file_path, pages, chunks, imported_at
                 FROM sources WHERE id = ?1",
                params![id.as_str()],
                Self::row_to_source,
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn list_sources(&self) -> Result<Vec<Source>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, display_name, file_path, pages, chunks, imported_at
             FROM sources ORDER BY imported_at DESC",
        )?;
        let rows = stmt.query_map([], Self::row_to_source)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    fn row_to_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<Source> {
        Ok(Source {
            id: SourceId(row.get(0)?),
            display_name: row.get(1)?,
            file_path: row.get(2)?,
            pages: row.get(3)?,
            chunks: row.get(4)?,
            imported_at: row.get(5)?,
        })
    }

    /// Delete every chunk belonging to `id`, including rows left over from a
    /// legacy `"<id> p.N"` source-id scheme, then rebuild the FTS mirror in
    /// the same transaction.
    pub fn delete_chunks_for_source(&mut self, id: &SourceId) -> Result<()> {
        let tx = self.conn.transaction()?;
        let legacy_pattern = format!("{} p.%", id.as_str());
        tx.execute(
            "DELETE FROM doc_chunks WHERE source_id = ?1 OR source_id LIKE ?2",
            params![id.as_str(), legacy_pattern],
        )?;
        tx.execute("INSERT INTO doc_chunks_fts(doc_chunks_fts) VALUES('rebuild')", [])?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_source(&mut self, id: &SourceId) -> Result<()> {
        self.delete_chunks_for_source(id)?;
        self.conn
            .execute("DELETE FROM sources WHERE id = ?1", params![id.as_str()])?;
        Ok(())
    }

    // -- chunks (C2) ---------------------------------------------------------

    /// Insert a chunk, assigning it a fresh stable id. The FTS mirror is
    /// populated with `fts_content` when given, else with `content` as-is.
    pub fn insert(
        &self,
        source_id: &SourceId,
        page: Option<i64>,
        content: &str,
        section_title: &str,
        fts_content: Option<&str>,
    ) -> Result<ChunkId> {
        let chunk_id = ChunkId(uuid::Uuid::new_v4().to_string());
        self.conn.execute(
            "INSERT INTO doc_chunks (id, source_id, page, content, section_title)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![chunk_id.as_str(), source_id.as_str(), page, content, section_title],
        )?;
        let ordinal = self.conn.last_insert_rowid();

        if let Some(fts_content) = fts_content {
            self.conn.execute(
                "INSERT INTO doc_chunks_fts(rowid, content, source_id, section_title)
                 VALUES (?1, ?2, ?3, ?4)",
                params![ordinal, fts_content, source_id.as_str(), section_title],
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO doc_chunks_fts(rowid, content, source_id, section_title)
                 VALUES (?1, ?2, ?3, ?4)",
                params![ordinal, content, source_id.as_str(), section_title],
            )?;
        }
        Ok(chunk_id)
    }

    /// Run a BM25 probe against the lexical index. Returns hits ordered by
    /// ascending BM25 (best first), each carrying an 18-token snippet with
    /// the section-title prefix stripped back off where it can be
    /// identified.
    pub fn fts_hits(
        &self,
        query: &str,
        source_filter: Option<&SourceId>,
        limit: usize,
    ) -> Result<Vec<FtsHit>> {
        let sql = if source_filter.is_some() {
            "SELECT dc.ordinal, dc.id, dc.source_id, dc.page, dc.section_title,
                    snippet(doc_chunks_fts, 0, '', '', '…', 18) AS excerpt,
                    bm25(doc_chunks_fts) AS score
             FROM doc_chunks_fts
             JOIN doc_chunks dc ON dc.ordinal = doc_chunks_fts.rowid
             WHERE doc_chunks_fts MATCH ?1 AND dc.source_id = ?2
             ORDER BY score ASC
             LIMIT ?3"
        } else {
            "SELECT dc.ordinal, dc.id, dc.source_id, dc.page, dc.section_title,
                    snippet(doc_chunks_fts, 0, '', '', '…', 18) AS excerpt,
                    bm25(doc_chunks_fts) AS score
             FROM doc_chunks_fts
             JOIN doc_chunks dc ON dc.ordinal = doc_chunks_fts.rowid
             WHERE doc_chunks_fts MATCH ?1
             ORDER BY score ASC
             LIMIT ?2"
        };

        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<FtsHit> {
            let section_title: String = row.get(4)?;
            let raw_excerpt: String = row.get(5)?;
            Ok(FtsHit {
                ordinal: row.get(0)?,
                chunk_id: ChunkId(row.get(1)?),
                source_id: SourceId(row.get(2)?),
                page: row.get(3)?,
                excerpt: strip_section_title_prefix(&raw_excerpt, &section_title),
                bm25: row.get(6)?,
            })
        };

        let rows = if let Some(source_filter) = source_filter {
            stmt.query_map(params![query, source_filter.as_str(), limit as i64], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map(params![query, limit as i64], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
        Ok(Chunk {
            id: ChunkId(row.get(1)?),
            source_id: SourceId(row.get(2)?),
            ordinal: row.get(0)?,
            page: row.get(3)?,
            content: row.get(4)?,
            section_title: row.get(5)?,
        })
    }

    /// Fetch the `expand` chunks on either side of `around_ordinal` within
    /// the same source, inclusive of the anchor itself, ordered by ordinal
    /// (component C6, neighbor-window expansion).
    pub fn fetch_neighbors(
        &self,
        source_id: &SourceId,
        around_ordinal: i64,
        expand: i64,
    ) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT ordinal, id, source_id, page, content, section_title
             FROM doc_chunks
             WHERE source_id = ?1 AND ordinal BETWEEN ?2 AND ?3
             ORDER BY ordinal ASC",
        )?;
        let rows = stmt.query_map(
            params![source_id.as_str(), around_ordinal - expand, around_ordinal + expand],
            Self::row_to_chunk,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// All chunks from `page` forward (page ≥ `page`).
    pub fn fetch_chunks_from_page(&self, source_id: &SourceId, page: i64) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT ordinal, id, source_id, page, content, section_title
             FROM doc_chunks
             WHERE source_id = ?1 AND page >= ?2
             ORDER BY ordinal ASC",
        )?;
        let rows = stmt.query_map(params![source_id.as_str(), page], Self::row_to_chunk)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// Fetch chunks by id, skipping any id with no matching row, preserving
    /// no particular order (callers needing insertion order should
    /// index the result by id).
    pub fn fetch_chunks_by_ids(&self, ids: &[ChunkId]) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT ordinal, id, source_id, page, content, section_title
             FROM doc_chunks WHERE id = ?1",
        )?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(chunk) = stmt
                .query_row(params![id.as_str()], Self::row_to_chunk)
                .optional()?
            {
                out.push(chunk);
            }
        }
        Ok(out)
    }

    pub fn fetch_all_chunks(&self, source_id: &SourceId) -> Result<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT ordinal, id, source_id, page, content, section_title
             FROM doc_chunks
             WHERE source_id = ?1
             ORDER BY ordinal ASC",
        )?;
        let rows = stmt.query_map(params![source_id.as_str()], Self::row_to_chunk)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)
    }

    /// Find the ordinal of the first chunk whose raw content contains
    /// `text` as a substring, used to re-anchor a passage back into its
    /// source for neighbor expansion.
    pub fn find_anchor_ordinal(&self, source_id: &SourceId, text: &str) -> Result<Option<i64>> {
        let pattern = format!("%{}%", like_escape(text));
        self.conn
            .query_row(
                "SELECT ordinal FROM doc_chunks
                 WHERE source_id = ?1 AND content LIKE ?2 ESCAPE '\\'
                 ORDER BY ordinal ASC LIMIT 1",
                params![source_id.as_str(), pattern],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
    }

    /// `(page_count, chunk_count)` for the `repoCounts` supplemented
    /// feature, derived live from `doc_chunks` rather than trusting the
    /// denormalized `sources.pages`/`sources.chunks` columns.
    pub fn counts(&self, source_id: &SourceId) -> Result<(i64, i64)> {
        self.conn
            .query_row(
                "SELECT COUNT(DISTINCT page), COUNT(*) FROM doc_chunks WHERE source_id = ?1",
                params![source_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(StoreError::from)
    }

    // -- prefix cache (C3) -----------------------------------------------

    pub fn get_cached_prefix(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM prefix_cache WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
    }

    pub fn put_cached_prefix(&self, key: &str, value: &str, meta_json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO prefix_cache (key, value, meta, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, meta = excluded.meta",
            params![key, value, meta_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // -- vectors (C4) -------------------------------------------------------

    pub fn insert_vector(&self, chunk_id: &ChunkId, dim: usize, vector: &[f32]) -> Result<()> {
        let blob = vector_codec::encode(vector);
        self.conn.execute(
            "INSERT INTO doc_chunk_vectors (chunk_id, dim, vec) VALUES (?1, ?2, ?3)
             ON CONFLICT(chunk_id) DO UPDATE SET dim = excluded.dim, vec = excluded.vec",
            params![chunk_id.as_str(), dim as i64, blob],
        )?;
        Ok(())
    }

    pub fn fetch_vectors(
        &self,
        chunk_ids: &[ChunkId],
    ) -> Result<HashMap<ChunkId, (usize, Vec<f32>)>> {
        let mut out = HashMap::with_capacity(chunk_ids.len());
        let mut stmt = self
            .conn
            .prepare("SELECT dim, vec FROM doc_chunk_vectors WHERE chunk_id = ?1")?;
        for chunk_id in chunk_ids {
            let row: Option<(i64, Vec<u8>)> = stmt
                .query_row(params![chunk_id.as_str()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?;
            if let Some((dim, blob)) = row {
                let dim = dim as usize;
                let vector = vector_codec::decode(&blob, dim)?;
                out.insert(chunk_id.clone(), (dim, vector));
            }
        }
        Ok(out)
    }

    /// Chunk ids in `source_id` (or the whole corpus, when `None`) that have
    /// no row in `doc_chunk_vectors` yet, oldest ordinal first, capped at
    /// `limit` — feeds the embedding backfill loop.
    pub fn chunks_without_vector(
        &self,
        source_id: Option<&SourceId>,
        limit: usize,
    ) -> Result<Vec<ChunkId>> {
        let sql = if source_id.is_some() {
            "SELECT dc.id FROM doc_chunks dc
             LEFT JOIN doc_chunk_vectors v ON v.chunk_id = dc.id
             WHERE v.chunk_id IS NULL AND dc.source_id = ?1
             ORDER BY dc.ordinal ASC
             LIMIT ?2"
        } else {
            "SELECT dc.id FROM doc_chunks dc
             LEFT JOIN doc_chunk_vectors v ON v.chunk_id = dc.id
             WHERE v.chunk_id IS NULL
             ORDER BY dc.ordinal ASC
             LIMIT ?1"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<ChunkId> {
            Ok(ChunkId(row.get(0)?))
        };
        let rows = if let Some(source_id) = source_id {
            stmt.query_map(params![source_id.as_str(), limit as i64], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map(params![limit as i64], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }
}

/// Best-effort strip of a leading `section_title` from an FTS snippet: the
/// snippet function may start mid-passage with its own ellipsis marker, in
/// which case the prefix will not match and the snippet is returned as-is.
fn strip_section_title_prefix(excerpt: &str, section_title: &str) -> String {
    let trimmed_title = section_title.trim();
    if trimmed_title.is_empty() {
        return excerpt.to_string();
    }
    excerpt
        .strip_prefix(trimmed_title)
        .map(|rest| rest.trim_start().to_string())
        .unwrap_or_else(|| excerpt.to_string())
}

/// Escape `%`, `_`, and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> FolioStore {
        let store = FolioStore::open_in_memory().unwrap();
        store
            .insert_source(&SourceId::from("s1"), "/tmp/s1.txt", "S1", 1, 0)
            .unwrap();
        store
    }

    #[test]
    fn insert_and_fetch_all_chunks_round_trips() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        let id = store
            .insert(&source_id, Some(0), "hello world", "[S1, p.1] ", None)
            .unwrap();
        let chunks = store.fetch_all_chunks(&source_id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, id);
        assert_eq!(chunks[0].content, "hello world");
        assert_eq!(chunks[0].augmented_text(), "[S1, p.1] hello world");
    }

    #[test]
    fn fts_hits_finds_inserted_chunk_and_strips_prefix() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        store
            .insert(&source_id, Some(0), "the quick brown fox", "[S1, p.1] ", None)
            .unwrap();
        let hits = store.fts_hits("quick", None, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].excerpt.starts_with("[S1, p.1]"));
        assert!(hits[0].excerpt.contains("fox"));
    }

    #[test]
    fn delete_chunks_for_source_removes_legacy_wildcard_rows() {
        let mut store = seeded_store();
        let source_id = SourceId::from("s1");
        store.insert(&source_id, None, "a", "", None).unwrap();
        store
            .insert(&SourceId::from("s1 p.2"), None, "b", "", None)
            .unwrap();
        store.delete_chunks_for_source(&source_id).unwrap();
        assert!(store.fetch_all_chunks(&source_id).unwrap().is_empty());
        assert!(store
            .fetch_all_chunks(&SourceId::from("s1 p.2"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn vector_round_trips_through_store() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        let id = store.insert(&source_id, None, "x", "", None).unwrap();
        store.insert_vector(&id, 3, &[1.0, 2.0, 3.0]).unwrap();
        let fetched = store.fetch_vectors(&[id.clone()]).unwrap();
        let (dim, vec) = fetched.get(&id).unwrap();
        assert_eq!(*dim, 3);
        assert_eq!(vec, &vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn chunks_without_vector_excludes_embedded_rows() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        let a = store.insert(&source_id, None, "a", "", None).unwrap();
        let b = store.insert(&source_id, None, "b", "", None).unwrap();
        store.insert_vector(&a, 1, &[0.1]).unwrap();
        let pending = store.chunks_without_vector(Some(&source_id), 10).unwrap();
        assert_eq!(pending, vec![b]);
    }

    #[test]
    fn prefix_cache_round_trips() {
        let store = seeded_store();
        assert!(store.get_cached_prefix("k1").unwrap().is_none());
        store.put_cached_prefix("k1", "value", "{}").unwrap();
        assert_eq!(store.get_cached_prefix("k1").unwrap(), Some("value".to_string()));
    }

    #[test]
    fn fetch_neighbors_windows_around_anchor() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        for i in 0..5 {
            store
                .insert(&source_id, Some(i), &format!("chunk {i}"), "", None)
                .unwrap();
        }
        let neighbors = store.fetch_neighbors(&source_id, 3, 1).unwrap();
        let contents: Vec<&str> = neighbors.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["chunk 1", "chunk 2", "chunk 3"]);
    }

    #[test]
    fn find_anchor_ordinal_matches_as_substring() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        store.insert(&source_id, Some(0), "delta epsilon zeta", "", None).unwrap();
        let ordinal = store.find_anchor_ordinal(&source_id, "epsilon").unwrap();
        assert!(ordinal.is_some());
    }

    #[test]
    fn fetch_chunks_from_page_includes_later_pages() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        store.insert(&source_id, Some(0), "zero", "", None).unwrap();
        store.insert(&source_id, Some(1), "one", "", None).unwrap();
        store.insert(&source_id, Some(2), "two", "", None).unwrap();
        let chunks = store.fetch_chunks_from_page(&source_id, 1).unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn fetch_chunks_by_ids_skips_missing_and_preserves_matches() {
        let store = seeded_store();
        let source_id = SourceId::from("s1");
        let a = store.insert(&source_id, None, "a", "", None).unwrap();
        let missing = ChunkId("does-not-exist".to_string());
        let fetched = store.fetch_chunks_by_ids(&[a.clone(), missing]).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, a);
    }
}
