//! Embeds chapters and writes them into a collection of the vector index.

use crate::embedding::Embedder;
use crate::error::{KapittelError, Result};
use crate::retry::RetryPolicy;
use crate::segmentation::Chapter;
use crate::vector_store::{CollectionInfo, IndexEntry, VectorStore};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of one indexing run.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexReport {
    pub collection: String,
    /// Chapters written.
    pub indexed: usize,
    /// Whether the collection was created by this run.
    pub created_collection: bool,
}

/// Owns the lifecycle of collections and their entries.
pub struct KnowledgeBaseIndexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
    max_concurrent: usize,
}

impl KnowledgeBaseIndexer {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        retry: RetryPolicy,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            retry,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Embed and upsert chapters into `collection`.
    ///
    /// Entries are keyed by chapter ID, so indexing the same chapters again
    /// overwrites them. Either every chapter is written or none is.
    #[instrument(skip(self, chapters), fields(count = chapters.len()))]
    pub async fn index_chapters(&self, collection: &str, chapters: &[Chapter]) -> Result<IndexReport> {
        if collection.trim().is_empty() {
            return Err(KapittelError::InvalidInput("Collection name must not be empty".to_string()));
        }

        let total = chapters.len();
        let incomplete = |message: String| KapittelError::IndexIncomplete {
            collection: collection.to_string(),
            indexed: 0,
            total,
            message,
        };

        let created_collection = self
            .retry
            .run("create collection", || self.store.create_collection(collection))
            .await
            .map_err(|e| incomplete(e.error.to_string()))?;

        if chapters.is_empty() {
            return Ok(IndexReport {
                collection: collection.to_string(),
                indexed: 0,
                created_collection,
            });
        }

        let dimensions = self.embedder.dimensions();
        let embeddings: Vec<Vec<f32>> = stream::iter(chapters)
            .map(|chapter| async move {
                let input = chapter.embedding_input();
                let operation = format!("embed chapter {}", chapter.id);
                let embedding = self
                    .retry
                    .run(&operation, || self.embedder.embed(&input))
                    .await
                    .map_err(|e| format!("chapter {}: {}", chapter.id, e.error))?;
                if embedding.len() != dimensions {
                    return Err(format!(
                        "chapter {}: embedding has {} dimensions, embedder declares {}",
                        chapter.id,
                        embedding.len(),
                        dimensions
                    ));
                }
                Ok(embedding)
            })
            .buffered(self.max_concurrent)
            .try_collect()
            .await
            .map_err(incomplete)?;

        let entries: Vec<IndexEntry> = chapters
            .iter()
            .zip(embeddings)
            .map(|(chapter, embedding)| IndexEntry::for_chapter(chapter, collection, embedding))
            .collect();

        let indexed = self
            .retry
            .run("upsert chapters", || self.store.upsert_batch(collection, &entries))
            .await
            .map_err(|e| incomplete(e.error.to_string()))?;

        info!("Indexed {} chapters into {}", indexed, collection);
        Ok(IndexReport {
            collection: collection.to_string(),
            indexed,
            created_collection,
        })
    }

    /// Remove a video's chapters from a collection before re-indexing it.
    pub async fn remove_video(&self, collection: &str, video_id: &str) -> Result<usize> {
        self.store.delete_video(collection, video_id).await
    }

    pub async fn create_collection(&self, name: &str) -> Result<bool> {
        self.store.create_collection(name).await
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.store.list_collections().await
    }

    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        self.store.delete_collection(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Embeds text as a fixed per-keyword vector; can fail chosen inputs.
    #[derive(Default)]
    struct KeywordEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        failing: Mutex<HashMap<String, u32>>,
        inputs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.inputs.lock().unwrap().push(text.to_string());
            if let Some(left) = self.failing.lock().unwrap().get_mut(text) {
                if *left > 0 {
                    *left -= 1;
                    return Err(KapittelError::OpenAI("429 Too Many Requests".into()));
                }
            }
            Ok(self
                .vectors
                .iter()
                .find(|(k, _)| text.contains(k.as_str()))
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn chapter(video_id: &str, index: usize, summary: &str, keywords: &[&str]) -> Chapter {
        Chapter {
            id: Chapter::make_id(video_id, index),
            collection_id: "c".to_string(),
            video_id: video_id.to_string(),
            title: format!("Chapter {}", index),
            summary: summary.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            start_seconds: index as f64 * 60.0,
            end_seconds: (index + 1) as f64 * 60.0,
        }
    }

    fn indexer(store: Arc<MemoryVectorStore>, embedder: Arc<KeywordEmbedder>, attempts: u32) -> KnowledgeBaseIndexer {
        KnowledgeBaseIndexer::new(store, embedder, RetryPolicy::immediate(attempts, Duration::from_secs(5)), 2)
    }

    #[tokio::test]
    async fn test_indexes_summary_and_keywords() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(KeywordEmbedder {
            vectors: HashMap::from([("ownership".to_string(), vec![1.0, 0.0, 0.0])]),
            ..Default::default()
        });
        let chapters = vec![
            chapter("v", 0, "Intro.", &["welcome"]),
            chapter("v", 1, "Rules.", &["ownership", "moves"]),
        ];

        let report = indexer(store.clone(), embedder.clone(), 1)
            .index_chapters("rust", &chapters)
            .await
            .unwrap();
        assert_eq!(report.indexed, 2);
        assert!(report.created_collection);

        assert!(embedder
            .inputs
            .lock()
            .unwrap()
            .contains(&"Rules.\nKeywords: ownership, moves".to_string()));

        let hits = store.search("rust", &[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].entry.chapter_id, "v-001");
        assert_eq!(hits[0].entry.video_id, "v");
        assert_eq!(hits[0].entry.start_seconds, 60.0);
    }

    #[tokio::test]
    async fn test_reindexing_a_chapter_keeps_one_entry() {
        let store = Arc::new(MemoryVectorStore::new());
        let mut embedder = KeywordEmbedder::default();
        embedder.vectors.insert("first".to_string(), vec![1.0, 0.0, 0.0]);
        embedder.vectors.insert("second".to_string(), vec![0.0, 1.0, 0.0]);
        let embedder = Arc::new(embedder);
        let indexer = indexer(store.clone(), embedder, 1);

        let mut forty_two = chapter("v", 42, "first take", &["k"]);
        forty_two.id = "42".to_string();
        indexer.index_chapters("c", &[forty_two.clone()]).await.unwrap();
        forty_two.summary = "second take".to_string();
        let report = indexer.index_chapters("c", &[forty_two]).await.unwrap();
        assert!(!report.created_collection);

        let info = store.collection_info("c").await.unwrap().unwrap();
        assert_eq!(info.entry_count, 1);
        let hits = store.search("c", &[0.0, 1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].entry.embedding, vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_transient_embedding_failure_is_retried() {
        let store = Arc::new(MemoryVectorStore::new());
        let input = "Rules.\nKeywords: ownership".to_string();
        let embedder = Arc::new(KeywordEmbedder {
            failing: Mutex::new(HashMap::from([(input, 2)])),
            ..Default::default()
        });

        let report = indexer(store, embedder, 3)
            .index_chapters("c", &[chapter("v", 0, "Rules.", &["ownership"])])
            .await
            .unwrap();
        assert_eq!(report.indexed, 1);
    }

    #[tokio::test]
    async fn test_exhausted_embedding_writes_nothing() {
        let store = Arc::new(MemoryVectorStore::new());
        let input = "Rules.\nKeywords: ownership".to_string();
        let embedder = Arc::new(KeywordEmbedder {
            failing: Mutex::new(HashMap::from([(input, 10)])),
            ..Default::default()
        });
        let chapters = vec![
            chapter("v", 0, "Intro.", &["welcome"]),
            chapter("v", 1, "Rules.", &["ownership"]),
        ];

        let err = indexer(store.clone(), embedder, 2)
            .index_chapters("c", &chapters)
            .await
            .unwrap_err();
        match err {
            KapittelError::IndexIncomplete { collection, indexed, total, message } => {
                assert_eq!(collection, "c");
                assert_eq!(indexed, 0);
                assert_eq!(total, 2);
                assert!(message.contains("v-001"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let info = store.collection_info("c").await.unwrap().unwrap();
        assert_eq!(info.entry_count, 0);
    }

    #[tokio::test]
    async fn test_embedding_of_the_wrong_width_writes_nothing() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(KeywordEmbedder {
            vectors: HashMap::from([("short".to_string(), vec![1.0, 0.0])]),
            ..Default::default()
        });
        let chapters = vec![
            chapter("v", 0, "Intro.", &["welcome"]),
            chapter("v", 1, "A short one.", &["k"]),
        ];

        let err = indexer(store.clone(), embedder, 1)
            .index_chapters("c", &chapters)
            .await
            .unwrap_err();
        match err {
            KapittelError::IndexIncomplete { message, .. } => {
                assert!(message.contains("v-001"));
                assert!(message.contains("2 dimensions"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.collection_info("c").await.unwrap().unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_collection_lifecycle() {
        let store = Arc::new(MemoryVectorStore::new());
        let indexer = indexer(store, Arc::new(KeywordEmbedder::default()), 1);

        assert!(indexer.create_collection("a").await.unwrap());
        indexer
            .index_chapters("b", &[chapter("v", 0, "S.", &["k"])])
            .await
            .unwrap();

        let names: Vec<String> = indexer
            .list_collections()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        assert_eq!(indexer.remove_video("b", "v").await.unwrap(), 1);
        assert!(indexer.delete_collection("a").await.unwrap());
        assert_eq!(indexer.list_collections().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_collection_name_is_invalid() {
        let store = Arc::new(MemoryVectorStore::new());
        let err = indexer(store, Arc::new(KeywordEmbedder::default()), 1)
            .index_chapters(" ", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, KapittelError::InvalidInput(_)));
    }
}
