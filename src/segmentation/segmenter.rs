//! Chapter segmentation driven by a chat model.

use super::anchors::{format_anchor_time, inject_anchors};
use super::chapter::{parse_chapter_response, Chapter, ChapterCandidate};
use super::validate::{describe_violations, validate_chapters};
use crate::chat::{ChatMessage, ChatModel, ResponseMode};
use crate::config::Prompts;
use crate::error::{KapittelError, Result};
use crate::retry::RetryPolicy;
use crate::transcription::{quantize_seconds, Transcript};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Answers requested per video: the first one plus one corrected answer.
const MAX_SEGMENTATION_ATTEMPTS: u32 = 2;

/// Splits a transcript into validated chapters.
pub struct ChapterSegmenter {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
    retry: RetryPolicy,
    anchor_interval_seconds: f64,
    boundary_tolerance_seconds: f64,
}

impl ChapterSegmenter {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self {
            model,
            prompts: Prompts::default(),
            retry,
            anchor_interval_seconds: 30.0,
            boundary_tolerance_seconds: 1.0,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Seconds between time anchors in the text sent to the model.
    pub fn with_anchor_interval(mut self, seconds: f64) -> Self {
        self.anchor_interval_seconds = seconds;
        self
    }

    /// Largest edge drift or gap between chapters that is snapped instead of
    /// rejected. Overlaps are always rejected.
    pub fn with_boundary_tolerance(mut self, seconds: f64) -> Self {
        self.boundary_tolerance_seconds = seconds;
        self
    }

    fn initial_messages(&self, transcript: &Transcript, anchored: &str, target_chapters: Option<usize>) -> Vec<ChatMessage> {
        let chapter_hint = match target_chapters {
            Some(n) => format!("Aim for about {} chapters.\n", n),
            None => "Choose the number of chapters that fits the content.\n".to_string(),
        };

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), transcript.video_id.clone());
        vars.insert("duration".to_string(), format_anchor_time(transcript.duration_seconds));
        vars.insert("chapter_hint".to_string(), chapter_hint);
        vars.insert("transcript".to_string(), anchored.to_string());

        vec![
            ChatMessage::system(self.prompts.render_with_custom(&self.prompts.segmentation.system, &vars)),
            ChatMessage::user(self.prompts.render_with_custom(&self.prompts.segmentation.user, &vars)),
        ]
    }

    fn correction_message(&self, problem: &str) -> ChatMessage {
        let mut vars = HashMap::new();
        vars.insert("problem".to_string(), problem.to_string());
        ChatMessage::user(self.prompts.render_with_custom(&self.prompts.segmentation.correction, &vars))
    }

    /// Parse and validate one reply; the error is the text shown to the model.
    fn check(&self, response: &str, duration: f64) -> std::result::Result<Vec<ChapterCandidate>, String> {
        let candidates = parse_chapter_response(response).map_err(|e| e.to_string())?;
        validate_chapters(candidates, duration, self.boundary_tolerance_seconds)
            .map_err(|violations| describe_violations(&violations))
    }

    /// Segment a transcript into chapters belonging to `collection_id`.
    ///
    /// A rejected reply is answered once with the problem description; a
    /// second rejection fails with [`KapittelError::SegmentationValidation`].
    #[instrument(skip(self, transcript), fields(video_id = %transcript.video_id, model = %self.model.model_name()))]
    pub async fn segment(
        &self,
        transcript: &Transcript,
        collection_id: &str,
        target_chapters: Option<usize>,
    ) -> Result<Vec<Chapter>> {
        if transcript.segments.is_empty() {
            return Err(KapittelError::InvalidInput(format!(
                "Transcript for '{}' has no speech to segment",
                transcript.video_id
            )));
        }

        let anchored = inject_anchors(transcript, self.anchor_interval_seconds);
        debug!("Anchored transcript with {} anchors", anchored.anchors.len());

        let mut messages = self.initial_messages(transcript, &anchored.text, target_chapters);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self
                .retry
                .run("chapter segmentation", || self.model.complete(&messages, ResponseMode::Json))
                .await
                .map_err(|exhausted| exhausted.error)?;

            match self.check(&response, transcript.duration_seconds) {
                Ok(candidates) => {
                    info!("Segmented into {} chapters (attempt {})", candidates.len(), attempt);
                    return Ok(build_chapters(candidates, &transcript.video_id, collection_id));
                }
                Err(problem) if attempt >= MAX_SEGMENTATION_ATTEMPTS => {
                    return Err(KapittelError::SegmentationValidation {
                        attempts: attempt,
                        detail: problem,
                    });
                }
                Err(problem) => {
                    warn!("Chapter answer rejected: {}", problem);
                    messages.push(ChatMessage::assistant(response));
                    messages.push(self.correction_message(&problem));
                }
            }
        }
    }
}

fn build_chapters(candidates: Vec<ChapterCandidate>, video_id: &str, collection_id: &str) -> Vec<Chapter> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| Chapter {
            id: Chapter::make_id(video_id, index),
            collection_id: collection_id.to_string(),
            video_id: video_id.to_string(),
            title: candidate.title.trim().to_string(),
            summary: candidate.summary.trim().to_string(),
            keywords: candidate.keywords,
            start_seconds: quantize_seconds(candidate.start_time),
            end_seconds: quantize_seconds(candidate.end_time),
        })
        .collect()
}
