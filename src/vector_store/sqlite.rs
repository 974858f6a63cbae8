//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian `f32` blobs and cosine similarity
//! is computed in Rust. Transcripts and chapter lists are stored as JSON
//! alongside the index so retrieval can re-slice text after a restart.

use super::{
    check_batch, rank, ArtifactStore, CollectionInfo, IndexEntry, ScoredEntry, StoredVideo,
    VectorStore,
};
use crate::error::{KapittelError, Result};
use crate::segmentation::Chapter;
use crate::transcription::Transcript;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    dimensions INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS index_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL REFERENCES collections(name),
    chapter_id TEXT NOT NULL,
    video_id TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    keywords_json TEXT NOT NULL,
    start_seconds REAL NOT NULL,
    end_seconds REAL NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL,
    UNIQUE (collection, chapter_id)
);

CREATE INDEX IF NOT EXISTS idx_entries_video ON index_entries(collection, video_id);

CREATE TABLE IF NOT EXISTS transcripts (
    video_id TEXT PRIMARY KEY,
    transcript_json TEXT NOT NULL,
    duration_seconds REAL NOT NULL,
    segment_count INTEGER NOT NULL,
    stored_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chapters (
    video_id TEXT PRIMARY KEY,
    chapters_json TEXT NOT NULL,
    chapter_count INTEGER NOT NULL,
    stored_at TEXT NOT NULL
);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KapittelError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn parse_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn collection_dimensions(conn: &Connection, name: &str) -> Result<Option<Option<usize>>> {
        let dims: Option<Option<i64>> = conn
            .query_row(
                "SELECT dimensions FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dims.map(|d| d.map(|d| d as usize)))
    }

    fn read_collections(conn: &Connection, name: Option<&str>) -> Result<Vec<CollectionInfo>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT c.name, c.dimensions, c.created_at,
                   COUNT(e.seq) AS entry_count,
                   COUNT(DISTINCT e.video_id) AS video_count
            FROM collections c
            LEFT JOIN index_entries e ON e.collection = c.name
            WHERE ?1 IS NULL OR c.name = ?1
            GROUP BY c.name
            ORDER BY c.name
            "#,
        )?;

        let rows = stmt.query_map(params![name], |row| {
            let dimensions: Option<i64> = row.get(1)?;
            let created_at: String = row.get(2)?;
            let entry_count: i64 = row.get(3)?;
            let video_count: i64 = row.get(4)?;
            Ok(CollectionInfo {
                name: row.get(0)?,
                dimensions: dimensions.map(|d| d as usize),
                created_at: Self::parse_time(&created_at),
                entry_count: entry_count as usize,
                video_count: video_count as usize,
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self))]
    async fn create_collection(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions, created_at) VALUES (?1, NULL, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        if inserted > 0 {
            info!("Created collection {}", name);
        }
        Ok(inserted > 0)
    }

    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn upsert_batch(&self, collection: &str, entries: &[IndexEntry]) -> Result<usize> {
        let mut conn = self.conn()?;
        let existing = Self::collection_dimensions(&conn, collection)?.flatten();
        let dimensions = check_batch(collection, entries, existing)?;
        let now = Utc::now().to_rfc3339();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO collections (name, dimensions, created_at) VALUES (?1, NULL, ?2)",
            params![collection, now],
        )?;
        tx.execute(
            "UPDATE collections SET dimensions = ?2 WHERE name = ?1",
            params![collection, dimensions.map(|d| d as i64)],
        )?;

        for entry in entries {
            tx.execute(
                r#"
                INSERT INTO index_entries
                (collection, chapter_id, video_id, title, summary, keywords_json,
                 start_seconds, end_seconds, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT (collection, chapter_id) DO UPDATE SET
                    video_id = excluded.video_id,
                    title = excluded.title,
                    summary = excluded.summary,
                    keywords_json = excluded.keywords_json,
                    start_seconds = excluded.start_seconds,
                    end_seconds = excluded.end_seconds,
                    embedding = excluded.embedding,
                    indexed_at = excluded.indexed_at
                "#,
                params![
                    collection,
                    entry.chapter_id,
                    entry.video_id,
                    entry.title,
                    entry.summary,
                    serde_json::to_string(&entry.keywords)?,
                    entry.start_seconds,
                    entry.end_seconds,
                    Self::embedding_to_bytes(&entry.embedding),
                    now,
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} entries into {}", entries.len(), collection);
        Ok(entries.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, collection: &str, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let conn = self.conn()?;

        match Self::collection_dimensions(&conn, collection)? {
            None => return Err(KapittelError::CollectionNotFound(collection.to_string())),
            Some(Some(d)) if d != query_embedding.len() => {
                return Err(KapittelError::InvalidInput(format!(
                    "Query has {} dimensions, collection '{}' uses {}",
                    query_embedding.len(),
                    collection,
                    d
                )));
            }
            Some(_) => {}
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT seq, chapter_id, video_id, title, summary, keywords_json,
                   start_seconds, end_seconds, embedding
            FROM index_entries
            WHERE collection = ?1
            "#,
        )?;

        let rows = stmt.query_map(params![collection], |row| {
            let keywords_json: String = row.get(5)?;
            let embedding_bytes: Vec<u8> = row.get(8)?;
            Ok((
                row.get::<_, i64>(0)?,
                keywords_json,
                IndexEntry {
                    chapter_id: row.get(1)?,
                    collection_id: collection.to_string(),
                    video_id: row.get(2)?,
                    title: row.get(3)?,
                    summary: row.get(4)?,
                    keywords: Vec::new(),
                    start_seconds: row.get(6)?,
                    end_seconds: row.get(7)?,
                    embedding: Self::bytes_to_embedding(&embedding_bytes),
                },
            ))
        })?;

        let candidates = rows
            .map(|row| {
                let (seq, keywords_json, mut entry) = row?;
                entry.keywords = serde_json::from_str(&keywords_json)?;
                Ok((seq, entry))
            })
            .collect::<Result<Vec<_>>>()?;
        let results = rank(query_embedding, candidates, k);

        debug!("Found {} matching entries", results.len());
        Ok(results)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.conn()?;
        Self::read_collections(&conn, None)
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let conn = self.conn()?;
        Ok(Self::read_collections(&conn, Some(name))?.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, name: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let entries = tx.execute("DELETE FROM index_entries WHERE collection = ?1", params![name])?;
        let deleted = tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        tx.commit()?;

        if deleted > 0 {
            info!("Deleted collection {} ({} entries)", name, entries);
        }
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn delete_video(&self, collection: &str, video_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM index_entries WHERE collection = ?1 AND video_id = ?2",
            params![collection, video_id],
        )?;

        info!("Deleted {} entries for video {}", deleted, video_id);
        Ok(deleted)
    }
}

#[async_trait]
impl ArtifactStore for SqliteVectorStore {
    #[instrument(skip(self, transcript), fields(video_id = %transcript.video_id))]
    async fn store_transcript(&self, transcript: &Transcript) -> Result<()> {
        let transcript_json = serde_json::to_string(transcript)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO transcripts
            (video_id, transcript_json, duration_seconds, segment_count, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                transcript.video_id,
                transcript_json,
                transcript.duration_seconds,
                transcript.segments.len() as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;

        info!("Stored transcript");
        Ok(())
    }

    async fn load_transcript(&self, video_id: &str) -> Result<Option<Transcript>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT transcript_json FROM transcripts WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }

    #[instrument(skip(self, chapters), fields(count = chapters.len()))]
    async fn store_chapters(&self, video_id: &str, chapters: &[Chapter]) -> Result<()> {
        let chapters_json = serde_json::to_string(chapters)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO chapters (video_id, chapters_json, chapter_count, stored_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                video_id,
                chapters_json,
                chapters.len() as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;

        info!("Stored chapters");
        Ok(())
    }

    async fn load_chapters(&self, video_id: &str) -> Result<Option<Vec<Chapter>>> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT chapters_json FROM chapters WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }

    async fn list_videos(&self) -> Result<Vec<StoredVideo>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT t.video_id, t.duration_seconds, t.segment_count, c.chapter_count, t.stored_at
            FROM transcripts t
            LEFT JOIN chapters c ON c.video_id = t.video_id
            ORDER BY t.video_id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let segment_count: i64 = row.get(2)?;
            let chapter_count: Option<i64> = row.get(3)?;
            let stored_at: String = row.get(4)?;
            Ok(StoredVideo {
                video_id: row.get(0)?,
                duration_seconds: row.get(1)?,
                segment_count: segment_count as usize,
                chapter_count: chapter_count.map(|c| c as usize),
                stored_at: Self::parse_time(&stored_at),
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::test_support;

    #[tokio::test]
    async fn test_reindexing_overwrites() {
        test_support::reindexing_overwrites(&SqliteVectorStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_empty_and_unknown_collections() {
        test_support::empty_and_unknown_collections(&SqliteVectorStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_searches_are_scoped() {
        test_support::searches_are_scoped(&SqliteVectorStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_ties_follow_insertion_order() {
        test_support::ties_follow_insertion_order(&SqliteVectorStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        test_support::batch_is_all_or_nothing(&SqliteVectorStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_delete_video_and_collection() {
        test_support::delete_video_and_collection(&SqliteVectorStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_artifacts_round_trip() {
        test_support::artifacts_round_trip(&SqliteVectorStore::in_memory().unwrap()).await;
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            store
                .upsert_batch("c", &[test_support::entry("c", "v-000", "v", vec![0.5, 0.25])])
                .await
                .unwrap();
        }

        let store = SqliteVectorStore::new(&path).unwrap();
        let hits = store.search("c", &[0.5, 0.25], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry, test_support::entry("c", "v-000", "v", vec![0.5, 0.25]));
    }
}
