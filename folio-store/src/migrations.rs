//! Ordered schema migrations applied at database open (component C1).

use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use crate::error::{Result, StoreError};

/// One schema migration: a name (for error messages) and the DDL it runs.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_sources",
        sql: "CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            pages INTEGER NOT NULL DEFAULT 0,
            chunks INTEGER NOT NULL DEFAULT 0,
            imported_at TEXT NOT NULL
        )",
    },
    Migration {
        name: "0002_doc_chunks",
        sql: "CREATE TABLE IF NOT EXISTS doc_chunks (
            ordinal INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            source_id TEXT NOT NULL REFERENCES sources(id),
            page INTEGER,
            content TEXT NOT NULL,
            section_title TEXT NOT NULL DEFAULT ''
        )",
    },
    Migration {
        name: "0003_doc_chunks_augmented_view",
        // Backs the FTS external-content table below. Keeping the augmented
        // (section_title + content) formula in a view, rather than in the
        // base table, lets `doc_chunks.content` stay the raw chunk text
        // while `INSERT INTO doc_chunks_fts(doc_chunks_fts) VALUES('rebuild')`
        // still regenerates the augmented payload correctly.
        sql: "CREATE VIEW IF NOT EXISTS doc_chunks_augmented AS
            SELECT ordinal, source_id, section_title, section_title || content AS content
            FROM doc_chunks",
    },
    Migration {
        name: "0004_doc_chunks_fts",
        sql: "CREATE VIRTUAL TABLE IF NOT EXISTS doc_chunks_fts USING fts5(
            content,
            source_id UNINDEXED,
            section_title UNINDEXED,
            content='doc_chunks_augmented',
            content_rowid='ordinal',
            tokenize=\"unicode61 remove_diacritics 2 tokenchars '-_'\"
        )",
    },
    Migration {
        name: "0005_prefix_cache",
        sql: "CREATE TABLE IF NOT EXISTS prefix_cache (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            meta TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
    Migration {
        name: "0006_doc_chunk_vectors",
        sql: "CREATE TABLE IF NOT EXISTS doc_chunk_vectors (
            chunk_id TEXT PRIMARY KEY REFERENCES doc_chunks(id) ON DELETE CASCADE,
            dim INTEGER NOT NULL,
            vec BLOB NOT NULL
        )",
    },
    Migration {
        name: "0007_doc_chunks_source_idx",
        sql: "CREATE INDEX IF NOT EXISTS idx_doc_chunks_source ON doc_chunks(source_id, ordinal)",
    },
];

/// Open (creating if needed) a database at `path` and apply every migration
/// inside a single transaction with foreign keys enabled. `path` may be the
/// literal string `:memory:`.
pub fn open_and_migrate(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let tx = conn.transaction()?;
    for m in MIGRATIONS {
        tx.execute_batch(m.sql)
            .map_err(|e| StoreError::Migration(format!("{}: {e}", m.name)))?;
    }
    tx.commit()?;
    info!(migrations = MIGRATIONS.len(), "applied schema migrations");

    migrate_legacy_vector_table(&conn)?;
    Ok(conn)
}

/// Detect and rebuild a legacy `doc_chunk_vectors` table keyed by the
/// chunk's row ordinal rather than its chunk id. Only triggers when a table literally named
/// `doc_chunk_vectors_legacy` is present, which is how a pre-migration
/// database snapshot is recognized: the current schema always creates
/// `doc_chunk_vectors` keyed by `chunk_id` directly, so the legacy variant
/// can only arrive pre-existing in the file under a different name.
fn migrate_legacy_vector_table(conn: &Connection) -> Result<()> {
    let legacy_exists: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'doc_chunk_vectors_legacy'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let Some(_) = legacy_exists else {
        return Ok(());
    };

    warn!("legacy ordinal-keyed vector table detected; rebuilding keyed by chunk id");

    let migrated = conn.execute(
        "INSERT INTO doc_chunk_vectors (chunk_id, dim, vec)
         SELECT dc.id, legacy.dim, legacy.vec
         FROM doc_chunk_vectors_legacy legacy
         JOIN doc_chunks dc ON dc.ordinal = legacy.ordinal
         WHERE NOT EXISTS (
             SELECT 1 FROM doc_chunk_vectors existing WHERE existing.chunk_id = dc.id
         )",
        [],
    )?;
    conn.execute("DROP TABLE doc_chunk_vectors_legacy", [])?;
    info!(migrated, "rebuilt legacy vector table keyed by chunk id");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_creates_all_tables() {
        let conn = open_and_migrate(":memory:").expect("migrations apply");
        for table in [
            "sources",
            "doc_chunks",
            "doc_chunks_fts",
            "prefix_cache",
            "doc_chunk_vectors",
        ] {
            let exists: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "table {table} should exist");
        }
    }

    #[test]
    fn migrates_legacy_ordinal_keyed_vector_table() {
        let conn = open_and_migrate(":memory:").expect("migrations apply");
        conn.execute_batch(
            "CREATE TABLE doc_chunk_vectors_legacy (ordinal INTEGER PRIMARY KEY, dim INTEGER NOT NULL, vec BLOB NOT NULL);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO sources (id, display_name, file_path, pages, chunks, imported_at) VALUES ('s1','S','p',1,1,'t')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO doc_chunks (ordinal, id, source_id, page, content, section_title) VALUES (1, 'c1', 's1', 0, 'hello', '')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO doc_chunk_vectors_legacy (ordinal, dim, vec) VALUES (1, 1, X'0000803F')",
            [],
        )
        .unwrap();

        migrate_legacy_vector_table(&conn).unwrap();

        let (dim, vec): (i64, Vec<u8>) = conn
            .query_row(
                "SELECT dim, vec FROM doc_chunk_vectors WHERE chunk_id = 'c1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(dim, 1);
        assert_eq!(vec, vec![0x00, 0x00, 0x80, 0x3F]);

        let legacy_gone: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'doc_chunk_vectors_legacy'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(legacy_gone, 0);
    }
}
