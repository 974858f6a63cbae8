//! Query-time retrieval with verbatim re-grounding.

use crate::embedding::Embedder;
use crate::error::{KapittelError, Result};
use crate::retry::RetryPolicy;
use crate::segmentation::Chapter;
use crate::transcription::Transcript;
use crate::vector_store::{ArtifactStore, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A chapter hit with the literal transcript text it covers.
#[derive(Debug, Clone)]
pub struct RetrievedChapter {
    pub chapter: Chapter,
    /// Similarity score (higher is better).
    pub score: f32,
    /// Transcript text of the chapter's time range, never the summary.
    pub text: String,
}

/// Finds the chapters of a collection that best match a query.
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    artifacts: Arc<dyn ArtifactStore>,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        artifacts: Arc<dyn ArtifactStore>,
        embedder: Arc<dyn Embedder>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            artifacts,
            embedder,
            retry,
        }
    }

    /// Top `k` chapters of `collection` for `query`, best first.
    ///
    /// An existing but empty collection yields no hits without embedding the
    /// query.
    #[instrument(skip(self, query), fields(query = %query))]
    pub async fn retrieve(&self, query: &str, collection: &str, k: usize) -> Result<Vec<RetrievedChapter>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(KapittelError::InvalidInput("Query must not be empty".to_string()));
        }

        let info = self
            .store
            .collection_info(collection)
            .await?
            .ok_or_else(|| KapittelError::CollectionNotFound(collection.to_string()))?;

        if k == 0 || info.entry_count == 0 {
            debug!("Nothing to search in {}", collection);
            return Ok(Vec::new());
        }

        let query_embedding = self
            .retry
            .run("embed query", || self.embedder.embed(query))
            .await
            .map_err(|e| e.error)?;

        let hits = self.store.search(collection, &query_embedding, k).await?;

        let mut transcripts: HashMap<String, Transcript> = HashMap::new();
        let mut results = Vec::with_capacity(hits.len());

        for hit in hits {
            let chapter = hit.entry.chapter();

            if !transcripts.contains_key(&chapter.video_id) {
                let transcript = self.artifacts.load_transcript(&chapter.video_id).await?.ok_or_else(|| {
                    KapittelError::ArtifactNotFound(format!("transcript for video {}", chapter.video_id))
                })?;
                transcripts.insert(chapter.video_id.clone(), transcript);
            }

            let text = transcripts
                .get(&chapter.video_id)
                .map(|t| t.text_between(chapter.start_seconds, chapter.end_seconds))
                .unwrap_or_default();

            results.push(RetrievedChapter {
                chapter,
                score: hit.score,
                text,
            });
        }

        info!("Retrieved {} chapters from {}", results.len(), collection);
        Ok(results)
    }
}
