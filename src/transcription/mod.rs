//! Transcription module for Kapittel.
//!
//! Chunks are transcribed independently by a [`Transcriber`] and merged into
//! one video-relative [`Transcript`] by the [`TranscriptAssembler`].

mod assembler;
mod models;
mod whisper;

pub use assembler::TranscriptAssembler;
pub use models::{format_timestamp, quantize_seconds, Transcript, TranscriptSegment};
pub use whisper::WhisperTranscriber;

use crate::audio::AudioChunk;
use crate::error::Result;
use async_trait::async_trait;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one chunk.
    ///
    /// Returned times are relative to the start of the chunk.
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
        language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>>;
}
