//! In-memory vector store implementation.
//!
//! Useful for testing and one-off runs that need no persistence.

use super::{
    check_batch, rank, ArtifactStore, CollectionInfo, IndexEntry, ScoredEntry, StoredVideo,
    VectorStore,
};
use crate::error::{KapittelError, Result};
use crate::segmentation::Chapter;
use crate::transcription::Transcript;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Collection {
    created_at: DateTime<Utc>,
    dimensions: Option<usize>,
    /// Chapter ID to (insertion sequence, entry).
    entries: HashMap<String, (i64, IndexEntry)>,
}

impl Collection {
    fn new() -> Self {
        Self {
            created_at: Utc::now(),
            dimensions: None,
            entries: HashMap::new(),
        }
    }

    fn info(&self, name: &str) -> CollectionInfo {
        let videos: HashSet<&str> = self.entries.values().map(|(_, e)| e.video_id.as_str()).collect();
        CollectionInfo {
            name: name.to_string(),
            entry_count: self.entries.len(),
            video_count: videos.len(),
            dimensions: self.dimensions,
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
struct Index {
    collections: BTreeMap<String, Collection>,
    next_seq: i64,
}

#[derive(Default)]
struct Artifacts {
    transcripts: HashMap<String, (Transcript, DateTime<Utc>)>,
    chapters: HashMap<String, Vec<Chapter>>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    index: RwLock<Index>,
    artifacts: RwLock<Artifacts>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read_index(&self) -> Result<RwLockReadGuard<'_, Index>> {
        self.index
            .read()
            .map_err(|e| KapittelError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write_index(&self) -> Result<RwLockWriteGuard<'_, Index>> {
        self.index
            .write()
            .map_err(|e| KapittelError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn read_artifacts(&self) -> Result<RwLockReadGuard<'_, Artifacts>> {
        self.artifacts
            .read()
            .map_err(|e| KapittelError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write_artifacts(&self) -> Result<RwLockWriteGuard<'_, Artifacts>> {
        self.artifacts
            .write()
            .map_err(|e| KapittelError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, name: &str) -> Result<bool> {
        let mut index = self.write_index()?;
        if index.collections.contains_key(name) {
            return Ok(false);
        }
        index.collections.insert(name.to_string(), Collection::new());
        Ok(true)
    }

    async fn upsert_batch(&self, collection: &str, entries: &[IndexEntry]) -> Result<usize> {
        let mut index = self.write_index()?;
        let existing = index.collections.get(collection).and_then(|c| c.dimensions);
        let dimensions = check_batch(collection, entries, existing)?;

        let Index { collections, next_seq } = &mut *index;
        let target = collections
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        target.dimensions = dimensions;

        for entry in entries {
            match target.entries.get_mut(&entry.chapter_id) {
                Some((_, stored)) => *stored = entry.clone(),
                None => {
                    *next_seq += 1;
                    target
                        .entries
                        .insert(entry.chapter_id.clone(), (*next_seq, entry.clone()));
                }
            }
        }
        Ok(entries.len())
    }

    async fn search(&self, collection: &str, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        let index = self.read_index()?;
        let target = index
            .collections
            .get(collection)
            .ok_or_else(|| KapittelError::CollectionNotFound(collection.to_string()))?;

        if let Some(d) = target.dimensions {
            if d != query_embedding.len() {
                return Err(KapittelError::InvalidInput(format!(
                    "Query has {} dimensions, collection '{}' uses {}",
                    query_embedding.len(),
                    collection,
                    d
                )));
            }
        }

        let candidates = target.entries.values().cloned().collect();
        Ok(rank(query_embedding, candidates, k))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let index = self.read_index()?;
        Ok(index
            .collections
            .iter()
            .map(|(name, c)| c.info(name))
            .collect())
    }

    async fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>> {
        let index = self.read_index()?;
        Ok(index.collections.get(name).map(|c| c.info(name)))
    }

    async fn delete_collection(&self, name: &str) -> Result<bool> {
        let mut index = self.write_index()?;
        Ok(index.collections.remove(name).is_some())
    }

    async fn delete_video(&self, collection: &str, video_id: &str) -> Result<usize> {
        let mut index = self.write_index()?;
        let Some(target) = index.collections.get_mut(collection) else {
            return Ok(0);
        };
        let initial_len = target.entries.len();
        target.entries.retain(|_, (_, entry)| entry.video_id != video_id);
        Ok(initial_len - target.entries.len())
    }
}

#[async_trait]
impl ArtifactStore for MemoryVectorStore {
    async fn store_transcript(&self, transcript: &Transcript) -> Result<()> {
        let mut artifacts = self.write_artifacts()?;
        artifacts
            .transcripts
            .insert(transcript.video_id.clone(), (transcript.clone(), Utc::now()));
        Ok(())
    }

    async fn load_transcript(&self, video_id: &str) -> Result<Option<Transcript>> {
        let artifacts = self.read_artifacts()?;
        Ok(artifacts.transcripts.get(video_id).map(|(t, _)| t.clone()))
    }

    async fn store_chapters(&self, video_id: &str, chapters: &[Chapter]) -> Result<()> {
        let mut artifacts = self.write_artifacts()?;
        artifacts.chapters.insert(video_id.to_string(), chapters.to_vec());
        Ok(())
    }

    async fn load_chapters(&self, video_id: &str) -> Result<Option<Vec<Chapter>>> {
        let artifacts = self.read_artifacts()?;
        Ok(artifacts.chapters.get(video_id).cloned())
    }

    async fn list_videos(&self) -> Result<Vec<StoredVideo>> {
        let artifacts = self.read_artifacts()?;
        let mut videos: Vec<StoredVideo> = artifacts
            .transcripts
            .iter()
            .map(|(video_id, (transcript, stored_at))| StoredVideo {
                video_id: video_id.clone(),
                duration_seconds: transcript.duration_seconds,
                segment_count: transcript.segments.len(),
                chapter_count: artifacts.chapters.get(video_id).map(|c| c.len()),
                stored_at: *stored_at,
            })
            .collect();
        videos.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(videos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::test_support;

    #[tokio::test]
    async fn test_reindexing_overwrites() {
        test_support::reindexing_overwrites(&MemoryVectorStore::new()).await;
    }

    #[tokio::test]
    async fn test_empty_and_unknown_collections() {
        test_support::empty_and_unknown_collections(&MemoryVectorStore::new()).await;
    }

    #[tokio::test]
    async fn test_searches_are_scoped() {
        test_support::searches_are_scoped(&MemoryVectorStore::new()).await;
    }

    #[tokio::test]
    async fn test_ties_follow_insertion_order() {
        test_support::ties_follow_insertion_order(&MemoryVectorStore::new()).await;
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        test_support::batch_is_all_or_nothing(&MemoryVectorStore::new()).await;
    }

    #[tokio::test]
    async fn test_delete_video_and_collection() {
        test_support::delete_video_and_collection(&MemoryVectorStore::new()).await;
    }

    #[tokio::test]
    async fn test_artifacts_round_trip() {
        test_support::artifacts_round_trip(&MemoryVectorStore::new()).await;
    }
}
