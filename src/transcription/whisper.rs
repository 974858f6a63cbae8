//! OpenAI Whisper transcription implementation.

use super::{Transcriber, TranscriptSegment};
use crate::audio::AudioChunk;
use crate::error::{KapittelError, Result};
use crate::openai::{create_client, map_openai_error};
use async_openai::config::OpenAIConfig;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: Client<OpenAIConfig>,
    model: String,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber with default settings.
    pub fn new() -> Result<Self> {
        Self::with_model("whisper-1")
    }

    /// Create a new Whisper transcriber for a specific model.
    pub fn with_model(model: &str) -> Result<Self> {
        Ok(Self::with_client(create_client()?, model))
    }

    pub fn with_client(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self, chunk), fields(chunk = chunk.index, bytes = chunk.payload.len()))]
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
        language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>> {
        debug!("Transcribing chunk");

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                format!("chunk_{:04}.wav", chunk.index),
                chunk.payload.clone(),
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| KapittelError::InvalidInput(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| map_openai_error("Whisper", e))?;

        let segments: Vec<TranscriptSegment> = match response.segments {
            Some(segs) => segs
                .iter()
                .map(|s| TranscriptSegment::new(s.start as f64, s.end as f64, s.text.trim()))
                .collect(),
            None if response.text.trim().is_empty() => Vec::new(),
            // Fallback: one segment spanning the whole chunk
            None => vec![TranscriptSegment::new(
                0.0,
                response.duration as f64,
                response.text.trim(),
            )],
        };

        debug!("Transcribed {} segments", segments.len());
        Ok(segments)
    }
}
