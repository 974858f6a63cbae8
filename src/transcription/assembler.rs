//! Merges per-chunk transcriptions into one video-relative transcript.

use super::{quantize_seconds, Transcriber, Transcript, TranscriptSegment};
use crate::audio::AudioChunk;
use crate::error::{KapittelError, Result};
use crate::retry::{Exhausted, RetryPolicy};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Drives a [`Transcriber`] over planned chunks.
pub struct TranscriptAssembler {
    transcriber: Arc<dyn Transcriber>,
    retry: RetryPolicy,
    max_concurrent: usize,
    language: Option<String>,
    show_progress: bool,
}

impl TranscriptAssembler {
    pub fn new(transcriber: Arc<dyn Transcriber>, retry: RetryPolicy, max_concurrent: usize) -> Self {
        Self {
            transcriber,
            retry,
            max_concurrent: max_concurrent.max(1),
            language: None,
            show_progress: false,
        }
    }

    /// Language hint passed to every chunk call.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Draw a progress bar on stderr while chunks are transcribed.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} Transcribe [{bar:30.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Transcribe every chunk and merge the results.
    ///
    /// All chunks run to completion even when one fails; the error reported
    /// is the one of the lowest failing chunk index.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn assemble(&self, video_id: &str, chunks: &[AudioChunk]) -> Result<Transcript> {
        let Some(last_chunk) = chunks.last() else {
            return Err(KapittelError::InvalidInput("No audio chunks to transcribe".to_string()));
        };
        let audio_end = last_chunk.end_offset;

        info!("Transcribing {} chunks ({} concurrent)", chunks.len(), self.max_concurrent);
        let pb = self.progress_bar(chunks.len());

        let mut results: Vec<(usize, f64, Vec<TranscriptSegment>)> = Vec::with_capacity(chunks.len());
        let mut failures: Vec<(usize, Exhausted)> = Vec::new();

        let language = self.language.as_deref();
        let mut stream = stream::iter(chunks)
            .map(|chunk| async move {
                let operation = format!("transcribe chunk {}", chunk.index);
                let outcome = self
                    .retry
                    .run(&operation, || self.transcriber.transcribe(chunk, language))
                    .await;
                (chunk.index, chunk.start_offset, outcome)
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((index, offset, outcome)) = stream.next().await {
            pb.inc(1);
            match outcome {
                Ok(segments) => {
                    debug!("Chunk {} returned {} segments", index, segments.len());
                    results.push((index, offset, segments));
                }
                Err(exhausted) => {
                    warn!(
                        "Chunk {} at {:.0}s failed after {} attempt(s): {}",
                        index, offset, exhausted.attempts, exhausted.error
                    );
                    failures.push((index, exhausted));
                }
            }
        }
        pb.finish_and_clear();

        if let Some((chunk_index, exhausted)) = failures.into_iter().min_by_key(|(index, _)| *index) {
            return Err(KapittelError::Transcription {
                chunk_index,
                attempts: exhausted.attempts,
                message: exhausted.error.to_string(),
            });
        }

        let segments = merge_chunk_segments(results);
        info!("Assembled {} segments", segments.len());

        Ok(Transcript::new(video_id.to_string(), segments, audio_end))
    }
}

/// Shift chunk-relative segments to video time and order them.
///
/// Chunks are taken in index order first so the stable sort by start leaves
/// ties in chunk order no matter which call finished first.
fn merge_chunk_segments(mut results: Vec<(usize, f64, Vec<TranscriptSegment>)>) -> Vec<TranscriptSegment> {
    results.sort_by_key(|(index, _, _)| *index);

    let mut merged = Vec::new();
    for (_, offset, segments) in results {
        for segment in segments {
            if segment.text.trim().is_empty() {
                continue;
            }
            merged.push(TranscriptSegment::new(
                quantize_seconds(segment.start_seconds + offset),
                quantize_seconds(segment.end_seconds + offset),
                segment.text,
            ));
        }
    }

    merged.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn chunk(index: usize, start: f64, end: f64) -> AudioChunk {
        AudioChunk {
            index,
            start_offset: start,
            end_offset: end,
            payload: Vec::new(),
        }
    }

    /// Returns scripted segments per chunk; can fail a chunk a number of
    /// times and delay chunks to shuffle completion order.
    #[derive(Default)]
    struct ScriptedTranscriber {
        segments: HashMap<usize, Vec<TranscriptSegment>>,
        failures: Mutex<HashMap<usize, u32>>,
        delays_ms: HashMap<usize, u64>,
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn transcribe(
            &self,
            chunk: &AudioChunk,
            _language: Option<&str>,
        ) -> Result<Vec<TranscriptSegment>> {
            self.calls.lock().unwrap().push(chunk.index);
            if let Some(ms) = self.delays_ms.get(&chunk.index) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            {
                let mut failures = self.failures.lock().unwrap();
                if let Some(left) = failures.get_mut(&chunk.index) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(KapittelError::OpenAI("503 Service Unavailable".into()));
                    }
                }
            }
            Ok(self.segments.get(&chunk.index).cloned().unwrap_or_default())
        }
    }

    fn assembler(transcriber: ScriptedTranscriber, max_attempts: u32) -> (TranscriptAssembler, Arc<ScriptedTranscriber>) {
        let transcriber = Arc::new(transcriber);
        let assembler = TranscriptAssembler::new(
            transcriber.clone(),
            RetryPolicy::immediate(max_attempts, Duration::from_secs(5)),
            3,
        );
        (assembler, transcriber)
    }

    fn three_chunks() -> Vec<AudioChunk> {
        vec![chunk(0, 0.0, 600.0), chunk(1, 600.0, 1200.0), chunk(2, 1200.0, 1500.0)]
    }

    fn scripted_segments() -> HashMap<usize, Vec<TranscriptSegment>> {
        HashMap::from([
            (0, vec![
                TranscriptSegment::new(0.0, 4.0, "welcome"),
                TranscriptSegment::new(590.0, 600.0, "first part ends"),
            ]),
            (1, vec![TranscriptSegment::new(0.5, 3.0, "second part")]),
            (2, vec![
                TranscriptSegment::new(10.0, 12.0, "later"),
                TranscriptSegment::new(1.0, 3.0, "earlier"),
                TranscriptSegment::new(295.0, 300.0, "goodbye"),
            ]),
        ])
    }

    #[tokio::test]
    async fn test_offsets_are_applied_and_sorted() {
        let (assembler, _) = assembler(
            ScriptedTranscriber {
                segments: scripted_segments(),
                ..Default::default()
            },
            1,
        );

        let transcript = assembler.assemble("talk", &three_chunks()).await.unwrap();

        let starts: Vec<f64> = transcript.segments.iter().map(|s| s.start_seconds).collect();
        assert_eq!(starts, vec![0.0, 590.0, 600.5, 1201.0, 1210.0, 1495.0]);
        assert_eq!(transcript.segments[3].text, "earlier");
        assert_eq!(transcript.segments.last().unwrap().end_seconds, 1500.0);
        assert_eq!(transcript.duration_seconds, 1500.0);
        assert_eq!(transcript.video_id, "talk");
    }

    #[tokio::test]
    async fn test_completion_order_does_not_change_output() {
        let (in_order, _) = assembler(
            ScriptedTranscriber {
                segments: scripted_segments(),
                ..Default::default()
            },
            1,
        );
        let (reversed, _) = assembler(
            ScriptedTranscriber {
                segments: scripted_segments(),
                delays_ms: HashMap::from([(0, 60), (1, 30)]),
                ..Default::default()
            },
            1,
        );

        let a = in_order.assemble("v", &three_chunks()).await.unwrap();
        let b = reversed.assemble("v", &three_chunks()).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (assembler, transcriber) = assembler(
            ScriptedTranscriber {
                segments: scripted_segments(),
                failures: Mutex::new(HashMap::from([(1, 2)])),
                ..Default::default()
            },
            3,
        );

        let transcript = assembler.assemble("v", &three_chunks()).await.unwrap();
        assert_eq!(transcript.segments.len(), 6);

        let calls = transcriber.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|&&i| i == 1).count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_chunk_fails_whole_assembly() {
        let (assembler, transcriber) = assembler(
            ScriptedTranscriber {
                segments: scripted_segments(),
                failures: Mutex::new(HashMap::from([(2, 10), (1, 10)])),
                delays_ms: HashMap::from([(1, 20)]),
                ..Default::default()
            },
            2,
        );

        let err = assembler.assemble("v", &three_chunks()).await.unwrap_err();
        match err {
            KapittelError::Transcription { chunk_index, attempts, .. } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Chunk 0 still ran even though others failed
        assert!(transcriber.calls.lock().unwrap().contains(&0));
    }

    #[tokio::test]
    async fn test_no_chunks_is_invalid() {
        let (assembler, _) = assembler(ScriptedTranscriber::default(), 1);
        let err = assembler.assemble("v", &[]).await.unwrap_err();
        assert!(matches!(err, KapittelError::InvalidInput(_)));
    }

    #[test]
    fn test_merge_keeps_chunk_order_on_equal_starts() {
        let merged = merge_chunk_segments(vec![
            (1, 10.0, vec![TranscriptSegment::new(0.0, 1.0, "b")]),
            (0, 0.0, vec![TranscriptSegment::new(10.0, 11.0, "a")]),
        ]);
        let texts: Vec<&str> = merged.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }
}
