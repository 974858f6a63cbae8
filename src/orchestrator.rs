//! Pipeline orchestrator for Kapittel.
//!
//! Coordinates the whole process from a video file to an indexed collection,
//! and the query path back to grounded text.

use crate::audio::{extract_audio, video_id_from_path, ChunkLimits, ChunkPlanner, PcmAudio};
use crate::chat::{ChatModel, OpenAIChatModel};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{KapittelError, Result};
use crate::indexer::{IndexReport, KnowledgeBaseIndexer};
use crate::rag::{Answer, Answerer, RetrievedChapter, Retriever};
use crate::retry::RetryPolicy;
use crate::segmentation::{Chapter, ChapterSegmenter};
use crate::transcription::{Transcriber, Transcript, TranscriptAssembler, WhisperTranscriber};
use crate::vector_store::{
    ArtifactStore, CollectionInfo, MemoryVectorStore, SqliteVectorStore, StoredVideo, VectorStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Collaborators the pipeline runs against.
#[derive(Clone)]
pub struct Components {
    pub transcriber: Arc<dyn Transcriber>,
    pub embedder: Arc<dyn Embedder>,
    pub segmentation_model: Arc<dyn ChatModel>,
    pub answer_model: Arc<dyn ChatModel>,
    pub store: Arc<dyn VectorStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

/// Per-run options for [`Orchestrator::process_video`].
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Ignore stored transcript and chapters and start from the audio.
    pub force: bool,
    /// Chapter count hint; falls back to `segmentation.target_chapters`.
    pub target_chapters: Option<usize>,
    /// Language hint; falls back to `transcription.language`.
    pub language: Option<String>,
}

/// Result of processing one video.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    pub video_id: String,
    pub collection: String,
    pub duration_seconds: f64,
    pub segment_count: usize,
    pub chapters: Vec<Chapter>,
    /// Number of index entries written.
    pub indexed: usize,
    /// Whether the stored transcript was reused instead of transcribing.
    pub reused_transcript: bool,
    /// Whether the stored chapters were reused instead of segmenting.
    pub reused_chapters: bool,
}

/// The main orchestrator for the Kapittel pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    components: Components,
    retry: RetryPolicy,
    show_progress: bool,
}

impl Orchestrator {
    /// Create an orchestrator backed by the OpenAI services and the
    /// configured store.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let (store, artifacts) = open_store(&settings)?;

        info!(
            "Using {} for transcription, {} for chapters, {} for answers",
            settings.transcription.model, settings.segmentation.model, settings.rag.model
        );

        let components = Components {
            transcriber: Arc::new(WhisperTranscriber::with_model(&settings.transcription.model)?),
            embedder: Arc::new(OpenAIEmbedder::with_config(
                &settings.embedding.model,
                settings.embedding.dimensions as usize,
            )?),
            segmentation_model: Arc::new(OpenAIChatModel::new(&settings.segmentation.model)?),
            answer_model: Arc::new(OpenAIChatModel::new(&settings.rag.model)?),
            store,
            artifacts,
        };

        Ok(Self::with_components(settings, prompts, components))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(settings: Settings, prompts: Prompts, components: Components) -> Self {
        let retry = RetryPolicy::from_settings(&settings.retry);
        Self {
            settings,
            prompts,
            components,
            retry,
            show_progress: false,
        }
    }

    /// Replace the retry policy used for every collaborator call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the model used for answer generation.
    pub fn with_answer_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.components.answer_model = model;
        self
    }

    /// Show a progress bar while transcribing.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process a video file: extract audio, transcribe, segment and index.
    ///
    /// Without `force`, a stored transcript (and its chapters) is reused so
    /// only the missing stages run.
    #[instrument(skip(self, video, options), fields(video = %video.display()))]
    pub async fn process_video(
        &self,
        video: &Path,
        collection: &str,
        options: &ProcessOptions,
    ) -> Result<ProcessResult> {
        let video_id = video_id_from_path(video);

        if !options.force {
            if let Some(transcript) = self.components.artifacts.load_transcript(&video_id).await? {
                info!("Reusing stored transcript for {}", video_id);
                return self.chapter_and_index(transcript, collection, options, true).await;
            }
        }

        let temp_dir = self.settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let audio_path = extract_audio(video, &temp_dir).await?;
        let audio = PcmAudio::open(&audio_path)?;
        let result = self.process_audio(&video_id, &audio, collection, options).await?;

        // Keep the extracted audio on failure so a rerun can skip ffmpeg
        if let Err(e) = std::fs::remove_file(&audio_path) {
            warn!("Failed to clean up extracted audio {:?}: {}", audio_path, e);
        }

        Ok(result)
    }

    /// Process already decoded audio for `video_id`.
    #[instrument(skip(self, audio, options))]
    pub async fn process_audio(
        &self,
        video_id: &str,
        audio: &PcmAudio,
        collection: &str,
        options: &ProcessOptions,
    ) -> Result<ProcessResult> {
        let transcript = self.transcribe(video_id, audio, options.language.clone()).await?;
        self.components.artifacts.store_transcript(&transcript).await?;

        let fresh = ProcessOptions {
            force: true,
            ..options.clone()
        };
        self.chapter_and_index(transcript, collection, &fresh, false).await
    }

    /// Plan chunks over `audio` and assemble their transcript.
    pub async fn transcribe(
        &self,
        video_id: &str,
        audio: &PcmAudio,
        language: Option<String>,
    ) -> Result<Transcript> {
        let planner = ChunkPlanner::new(ChunkLimits {
            max_duration_seconds: self.settings.transcription.chunk_duration_seconds as f64,
            max_bytes: self.settings.transcription.max_chunk_bytes,
        });
        let chunks = planner.plan(audio)?;
        info!("Transcribing {} chunks of {}", chunks.len(), video_id);

        let assembler = TranscriptAssembler::new(
            self.components.transcriber.clone(),
            self.retry.clone(),
            self.settings.transcription.max_concurrent_chunks,
        )
        .with_language(language.or_else(|| self.settings.transcription.language.clone()))
        .with_progress(self.show_progress);

        let transcript = assembler.assemble(video_id, &chunks).await?;

        // Trailing silence yields no segments but still belongs to the video
        Ok(Transcript::new(
            transcript.video_id,
            transcript.segments,
            audio.duration_seconds(),
        ))
    }

    /// Re-chapter a stored transcript and re-index it into `collection`.
    #[instrument(skip(self))]
    pub async fn resegment(
        &self,
        video_id: &str,
        collection: &str,
        target_chapters: Option<usize>,
    ) -> Result<ProcessResult> {
        let transcript = self.stored_transcript(video_id).await?;
        let options = ProcessOptions {
            force: true,
            target_chapters,
            language: None,
        };
        self.chapter_and_index(transcript, collection, &options, true).await
    }

    /// Re-embed a video's stored chapters into `collection`.
    #[instrument(skip(self))]
    pub async fn reindex(&self, video_id: &str, collection: &str) -> Result<IndexReport> {
        let chapters = self
            .components
            .artifacts
            .load_chapters(video_id)
            .await?
            .ok_or_else(|| KapittelError::ArtifactNotFound(format!("chapters for video {}", video_id)))?;
        self.index(video_id, collection, &chapters).await
    }

    /// Top `k` grounded chapters of `collection` for `query`.
    pub async fn retrieve(&self, query: &str, collection: &str, k: usize) -> Result<Vec<RetrievedChapter>> {
        self.retriever().retrieve(query, collection, k).await
    }

    /// Answer `question` from the chapters retrieved out of `collection`.
    #[instrument(skip(self, question))]
    pub async fn ask(&self, question: &str, collection: &str, k: usize) -> Result<Answer> {
        let context = self.retrieve(question, collection, k).await?;
        Answerer::new(self.components.answer_model.clone(), self.retry.clone())
            .with_prompts(self.prompts.clone())
            .answer(question, collection, context)
            .await
    }

    /// Stored chapters of a video, if it was segmented.
    pub async fn chapters(&self, video_id: &str) -> Result<Option<Vec<Chapter>>> {
        self.components.artifacts.load_chapters(video_id).await
    }

    /// Videos with a stored transcript.
    pub async fn list_videos(&self) -> Result<Vec<StoredVideo>> {
        self.components.artifacts.list_videos().await
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.indexer().list_collections().await
    }

    pub async fn delete_collection(&self, name: &str) -> Result<bool> {
        self.indexer().delete_collection(name).await
    }

    async fn stored_transcript(&self, video_id: &str) -> Result<Transcript> {
        self.components
            .artifacts
            .load_transcript(video_id)
            .await?
            .ok_or_else(|| {
                KapittelError::ArtifactNotFound(format!(
                    "transcript for video {}. Run `kapittel process` on the video first",
                    video_id
                ))
            })
    }

    async fn chapter_and_index(
        &self,
        transcript: Transcript,
        collection: &str,
        options: &ProcessOptions,
        reused_transcript: bool,
    ) -> Result<ProcessResult> {
        let stored = if options.force {
            None
        } else {
            self.components.artifacts.load_chapters(&transcript.video_id).await?
        };

        let (chapters, reused_chapters) = match stored {
            Some(chapters) => {
                info!("Reusing {} stored chapters for {}", chapters.len(), transcript.video_id);
                (chapters, true)
            }
            None => {
                let target = options.target_chapters.or(self.settings.segmentation.target_chapters);
                let chapters = self.segmenter().segment(&transcript, collection, target).await?;
                self.components
                    .artifacts
                    .store_chapters(&transcript.video_id, &chapters)
                    .await?;
                (chapters, false)
            }
        };

        let report = self.index(&transcript.video_id, collection, &chapters).await?;

        Ok(ProcessResult {
            video_id: transcript.video_id.clone(),
            collection: collection.to_string(),
            duration_seconds: transcript.duration_seconds,
            segment_count: transcript.segments.len(),
            chapters,
            indexed: report.indexed,
            reused_transcript,
            reused_chapters,
        })
    }

    /// Replace a video's entries in `collection` with `chapters`.
    async fn index(&self, video_id: &str, collection: &str, chapters: &[Chapter]) -> Result<IndexReport> {
        let indexer = self.indexer();
        let removed = indexer.remove_video(collection, video_id).await?;
        if removed > 0 {
            info!("Removed {} old entries of {} from {}", removed, video_id, collection);
        }
        indexer.index_chapters(collection, chapters).await
    }

    fn segmenter(&self) -> ChapterSegmenter {
        ChapterSegmenter::new(self.components.segmentation_model.clone(), self.retry.clone())
            .with_prompts(self.prompts.clone())
            .with_anchor_interval(self.settings.segmentation.anchor_interval_seconds)
            .with_boundary_tolerance(self.settings.segmentation.boundary_tolerance_seconds)
    }

    fn indexer(&self) -> KnowledgeBaseIndexer {
        KnowledgeBaseIndexer::new(
            self.components.store.clone(),
            self.components.embedder.clone(),
            self.retry.clone(),
            self.settings.embedding.max_concurrent,
        )
    }

    fn retriever(&self) -> Retriever {
        Retriever::new(
            self.components.store.clone(),
            self.components.artifacts.clone(),
            self.components.embedder.clone(),
            self.retry.clone(),
        )
    }
}

/// Open the configured store as both index and artifact store.
pub fn open_store(settings: &Settings) -> Result<(Arc<dyn VectorStore>, Arc<dyn ArtifactStore>)> {
    match settings.vector_store.provider.as_str() {
        "sqlite" => {
            let path: PathBuf = settings.sqlite_path();
            let store = Arc::new(SqliteVectorStore::new(&path)?);
            Ok((store.clone(), store))
        }
        "memory" => {
            let store = Arc::new(MemoryVectorStore::new());
            Ok((store.clone(), store))
        }
        other => Err(KapittelError::Config(format!(
            "Unknown vector store provider '{}' (expected sqlite or memory)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_a_config_error() {
        let mut settings = Settings::default();
        settings.vector_store.provider = "qdrant".to_string();
        assert!(matches!(open_store(&settings), Err(KapittelError::Config(_))));
    }

    #[test]
    fn test_memory_provider_opens() {
        let mut settings = Settings::default();
        settings.vector_store.provider = "memory".to_string();
        assert!(open_store(&settings).is_ok());
    }
}
