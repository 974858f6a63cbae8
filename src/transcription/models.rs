//! Data models for transcription.

use serde::{Deserialize, Serialize};

/// Round a time to whole milliseconds.
///
/// Every time that enters a [`Transcript`] goes through this, so printing a
/// time with three decimals and parsing it back yields the same `f64`.
pub fn quantize_seconds(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// A complete, video-relative transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Video ID this transcript belongs to.
    pub video_id: String,
    /// Segments ordered by start time.
    pub segments: Vec<TranscriptSegment>,
    /// Duration of the source audio in seconds.
    pub duration_seconds: f64,
}

impl Transcript {
    /// Create a transcript from ordered segments.
    ///
    /// The duration is never less than the end of the last segment.
    pub fn new(video_id: String, segments: Vec<TranscriptSegment>, duration_seconds: f64) -> Self {
        let last_end = segments
            .iter()
            .map(|s| s.end_seconds)
            .fold(0.0_f64, f64::max);

        Self {
            video_id,
            segments,
            duration_seconds: quantize_seconds(duration_seconds.max(last_end)),
        }
    }

    /// Verbatim text of the segments starting in `[start, end)`.
    ///
    /// A window that reaches the end of the transcript also takes segments
    /// starting exactly at `end`.
    pub fn text_between(&self, start: f64, end: f64) -> String {
        let closed = end >= self.duration_seconds;
        self.segments
            .iter()
            .filter(|s| {
                s.start_seconds >= start
                    && (s.start_seconds < end || (closed && s.start_seconds <= end))
            })
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Transcribed text content.
    pub text: String,
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            end_seconds,
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
