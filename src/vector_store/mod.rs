//! Vector store abstraction for Kapittel.
//!
//! Provides trait-based interfaces for the chapter index ([`VectorStore`]) and
//! for the artifacts retrieval needs to re-slice source text
//! ([`ArtifactStore`]). Both backends implement both traits.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::{KapittelError, Result};
use crate::segmentation::Chapter;
use crate::transcription::Transcript;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted link between an embedding and its chapter.
///
/// An entry carries the chapter as it was indexed, so a collection stays
/// consistent when the same video is re-segmented into another collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Chapter ID, unique within a collection.
    pub chapter_id: String,
    pub collection_id: String,
    /// Video whose transcript holds the chapter text.
    pub video_id: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub embedding: Vec<f32>,
}

impl IndexEntry {
    /// Build the entry for a chapter.
    pub fn for_chapter(chapter: &Chapter, collection_id: &str, embedding: Vec<f32>) -> Self {
        Self {
            chapter_id: chapter.id.clone(),
            collection_id: collection_id.to_string(),
            video_id: chapter.video_id.clone(),
            title: chapter.title.clone(),
            summary: chapter.summary.clone(),
            keywords: chapter.keywords.clone(),
            start_seconds: chapter.start_seconds,
            end_seconds: chapter.end_seconds,
            embedding,
        }
    }

    /// The chapter this entry was indexed from.
    pub fn chapter(&self) -> Chapter {
        Chapter {
            id: self.chapter_id.clone(),
            collection_id: self.collection_id.clone(),
            video_id: self.video_id.clone(),
            title: self.title.clone(),
            summary: self.summary.clone(),
            keywords: self.keywords.clone(),
            start_seconds: self.start_seconds,
            end_seconds: self.end_seconds,
        }
    }
}

/// A search hit with score.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// Summary information about a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Number of indexed chapters.
    pub entry_count: usize,
    /// Number of distinct videos.
    pub video_count: usize,
    /// Embedding dimensions, fixed by the first insert.
    pub dimensions: Option<usize>,
    pub created_at: DateTime<Utc>,
}

/// Summary information about a stored transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVideo {
    pub video_id: String,
    pub duration_seconds: f64,
    pub segment_count: usize,
    /// Number of stored chapters, if the video was segmented.
    pub chapter_count: Option<usize>,
    pub stored_at: DateTime<Utc>,
}

/// Trait for the chapter index.
///
/// Searches are always scoped to one collection.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection. Returns `false` if it already existed.
    async fn create_collection(&self, name: &str) -> Result<bool>;

    /// Insert or overwrite entries keyed by chapter ID, all or nothing.
    ///
    /// The collection is created if needed. An overwritten entry keeps its
    /// original insertion position for tie-breaking.
    async fn upsert_batch(&self, collection: &str, entries: &[IndexEntry]) -> Result<usize>;

    /// Top `k` entries by cosine similarity, best first. Equal scores are
    /// ordered by insertion.
    async fn search(&self, collection: &str, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// List all collections.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Get a specific collection's information.
    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>>;

    /// Delete a collection and its entries. Returns `false` if it did not exist.
    async fn delete_collection(&self, name: &str) -> Result<bool>;

    /// Delete one video's entries from a collection.
    async fn delete_video(&self, collection: &str, video_id: &str) -> Result<usize>;
}

/// Trait for the transcripts and chapters that outlive an indexing run.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store (or replace) a video's transcript.
    async fn store_transcript(&self, transcript: &Transcript) -> Result<()>;

    async fn load_transcript(&self, video_id: &str) -> Result<Option<Transcript>>;

    /// Store (or replace) a video's chapter list.
    async fn store_chapters(&self, video_id: &str, chapters: &[Chapter]) -> Result<()>;

    async fn load_chapters(&self, video_id: &str) -> Result<Option<Vec<Chapter>>>;

    /// List stored transcripts.
    async fn list_videos(&self) -> Result<Vec<StoredVideo>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Check a batch before anything is written.
///
/// Every entry must belong to `collection`, and all embeddings must share
/// one non-zero dimension that matches `existing` when the collection
/// already has one. Returns the batch dimension.
fn check_batch(collection: &str, entries: &[IndexEntry], existing: Option<usize>) -> Result<Option<usize>> {
    let mut dimensions = existing;
    for entry in entries {
        if entry.collection_id != collection {
            return Err(KapittelError::InvalidInput(format!(
                "Entry {} belongs to collection '{}', not '{}'",
                entry.chapter_id, entry.collection_id, collection
            )));
        }
        if entry.embedding.is_empty() {
            return Err(KapittelError::InvalidInput(format!(
                "Entry {} has an empty embedding",
                entry.chapter_id
            )));
        }
        match dimensions {
            Some(d) if d != entry.embedding.len() => {
                return Err(KapittelError::InvalidInput(format!(
                    "Entry {} has {} dimensions, collection '{}' uses {}",
                    entry.chapter_id,
                    entry.embedding.len(),
                    collection,
                    d
                )));
            }
            Some(_) => {}
            None => dimensions = Some(entry.embedding.len()),
        }
    }
    Ok(dimensions)
}

/// Score candidates and keep the best `k`.
///
/// Candidates are `(insertion sequence, entry)`; the sequence breaks ties so
/// identical state always yields identical order.
fn rank(query_embedding: &[f32], candidates: Vec<(i64, IndexEntry)>, k: usize) -> Vec<ScoredEntry> {
    let mut scored: Vec<(i64, ScoredEntry)> = candidates
        .into_iter()
        .map(|(seq, entry)| {
            let score = cosine_similarity(query_embedding, &entry.embedding);
            (seq, ScoredEntry { entry, score })
        })
        .collect();

    scored.sort_by(|(seq_a, a), (seq_b, b)| b.score.total_cmp(&a.score).then(seq_a.cmp(seq_b)));
    scored.truncate(k);
    scored.into_iter().map(|(_, hit)| hit).collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_rank_breaks_ties_by_sequence() {
        let e = |id: &str, v: Vec<f32>| test_support::entry("c", id, "v", v);
        let ranked = rank(
            &[1.0, 0.0],
            vec![(7, e("late", vec![1.0, 0.0])), (3, e("early", vec![2.0, 0.0])), (1, e("off", vec![0.0, 1.0]))],
            2,
        );
        let ids: Vec<&str> = ranked.iter().map(|h| h.entry.chapter_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_entry_rebuilds_its_chapter() {
        let chapter = Chapter {
            id: "talk-001".to_string(),
            collection_id: "elsewhere".to_string(),
            video_id: "talk".to_string(),
            title: "Borrowing".to_string(),
            summary: "Shared and unique references.".to_string(),
            keywords: vec!["borrow".to_string()],
            start_seconds: 60.0,
            end_seconds: 120.5,
        };
        let entry = IndexEntry::for_chapter(&chapter, "rust", vec![1.0]);
        let rebuilt = entry.chapter();

        assert_eq!(rebuilt.collection_id, "rust");
        assert_eq!(Chapter { collection_id: "elsewhere".to_string(), ..rebuilt }, chapter);
    }

    #[test]
    fn test_check_batch_rejects_foreign_entries() {
        let entries = vec![test_support::entry("other", "x", "v", vec![1.0])];
        assert!(check_batch("c", &entries, None).is_err());
    }
}
