//! Time anchors embedded in transcript text.
//!
//! The segmentation model only sees text, so the transcript is rewritten with
//! markers of the form `<t=SECONDS>`. A marker states that the words following
//! it are spoken from that time on. Spoken `&` and `<` are escaped so that
//! every `<` in anchored text starts a marker.

use crate::error::{KapittelError, Result};
use crate::transcription::{quantize_seconds, Transcript};

/// Transcript text with embedded time anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredTranscript {
    pub text: String,
    /// Anchor times in the order they appear in `text`.
    pub anchors: Vec<f64>,
}

/// Text between two consecutive anchors.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredSpan {
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// Format a time for use inside a marker: at most three decimals, no
/// trailing zeros.
pub fn format_anchor_time(seconds: f64) -> String {
    let seconds = quantize_seconds(seconds);
    // Avoid printing "-0"
    let seconds = if seconds == 0.0 { 0.0 } else { seconds };
    let formatted = format!("{:.3}", seconds);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Render one marker.
pub fn anchor_marker(seconds: f64) -> String {
    format!("<t={}>", format_anchor_time(seconds))
}

struct AnchorWriter {
    text: String,
    anchors: Vec<f64>,
}

impl AnchorWriter {
    fn anchor(&mut self, seconds: f64) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&anchor_marker(seconds));
        self.anchors.push(quantize_seconds(seconds));
    }

    fn words(&mut self, words: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        escape_into(words, &mut self.text);
    }

    fn last_anchor(&self) -> Option<f64> {
        self.anchors.last().copied()
    }
}

/// Rewrite a transcript with time anchors.
///
/// A marker goes before a segment once `interval_seconds` have passed since
/// the previous marker; the first segment is always marked. A marked segment
/// that starts after the previous one ended is preceded by a marker at that
/// end, so silence is never attributed to speech. A final marker at the
/// transcript duration closes the text.
pub fn inject_anchors(transcript: &Transcript, interval_seconds: f64) -> AnchoredTranscript {
    let interval = interval_seconds.max(0.0);
    let mut writer = AnchorWriter {
        text: String::new(),
        anchors: Vec::new(),
    };
    let mut previous_end: Option<f64> = None;

    for segment in &transcript.segments {
        let due = match writer.last_anchor() {
            None => true,
            Some(last) => segment.start_seconds - last >= interval,
        };

        if due {
            if let (Some(end), Some(last)) = (previous_end, writer.last_anchor()) {
                if segment.start_seconds > end && end > last {
                    writer.anchor(end);
                }
            }
            writer.anchor(segment.start_seconds);
        }

        writer.words(&segment.text);
        previous_end = Some(segment.end_seconds);
    }

    let duration = transcript.duration_seconds;
    if let (Some(end), Some(last)) = (previous_end, writer.last_anchor()) {
        if end < duration && end > last {
            writer.anchor(end);
        }
    }
    writer.anchor(duration);

    AnchoredTranscript {
        text: writer.text,
        anchors: writer.anchors,
    }
}

/// Recover the spans between consecutive anchors.
///
/// Spans without text (such as silence between a gap marker and the next
/// segment) are skipped. Fails on malformed markers and on text outside the
/// first and last marker.
pub fn parse_anchors(text: &str) -> Result<Vec<AnchoredSpan>> {
    let mut spans = Vec::new();
    let mut current: Option<f64> = None;
    let mut rest = text;

    loop {
        let (before, after) = match rest.find('<') {
            Some(pos) => (&rest[..pos], Some(&rest[pos..])),
            None => (rest, None),
        };

        let words = before.trim();
        let next = match after {
            Some(marker_text) => {
                let close = marker_text.find('>').ok_or_else(|| {
                    KapittelError::InvalidInput("Unterminated time anchor".to_string())
                })?;
                let time = parse_marker(&marker_text[..=close])?;
                rest = &marker_text[close + 1..];
                Some(time)
            }
            None => None,
        };

        if !words.is_empty() {
            match (current, next) {
                (Some(start), Some(end)) => spans.push(AnchoredSpan {
                    start_seconds: start,
                    end_seconds: end,
                    text: unescape(words),
                }),
                (None, _) => {
                    return Err(KapittelError::InvalidInput(
                        "Text before the first time anchor".to_string(),
                    ))
                }
                (Some(_), None) => {
                    return Err(KapittelError::InvalidInput(
                        "Text after the last time anchor".to_string(),
                    ))
                }
            }
        }

        match next {
            Some(time) => current = Some(time),
            None => break,
        }
    }

    Ok(spans)
}

fn parse_marker(marker: &str) -> Result<f64> {
    marker
        .strip_prefix("<t=")
        .and_then(|m| m.strip_suffix('>'))
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .ok_or_else(|| KapittelError::InvalidInput(format!("Malformed time anchor: {}", marker)))
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("&amp;") {
            out.push('&');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("&lt;") {
            out.push('<');
            rest = after;
        } else {
            out.push('&');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscriptSegment;

    fn transcript(segments: Vec<TranscriptSegment>, duration: f64) -> Transcript {
        Transcript::new("v".to_string(), segments, duration)
    }

    #[test]
    fn test_anchor_time_format() {
        assert_eq!(anchor_marker(0.0), "<t=0>");
        assert_eq!(anchor_marker(12.5), "<t=12.5>");
        assert_eq!(anchor_marker(600.125), "<t=600.125>");
        assert_eq!(anchor_marker(1500.0), "<t=1500>");
    }

    #[test]
    fn test_interval_controls_density() {
        let t = transcript(
            vec![
                TranscriptSegment::new(0.0, 10.0, "one"),
                TranscriptSegment::new(10.0, 20.0, "two"),
                TranscriptSegment::new(20.0, 30.0, "three"),
                TranscriptSegment::new(30.0, 40.0, "four"),
            ],
            40.0,
        );

        let anchored = inject_anchors(&t, 30.0);
        assert_eq!(anchored.text, "<t=0> one two three <t=30> four <t=40>");
        assert_eq!(anchored.anchors, vec![0.0, 30.0, 40.0]);
    }

    #[test]
    fn test_gap_gets_its_own_anchor() {
        let t = transcript(
            vec![
                TranscriptSegment::new(0.0, 5.0, "intro"),
                TranscriptSegment::new(40.0, 45.0, "after a pause"),
            ],
            60.0,
        );

        let anchored = inject_anchors(&t, 30.0);
        assert_eq!(
            anchored.text,
            "<t=0> intro <t=5> <t=40> after a pause <t=45> <t=60>"
        );
    }

    #[test]
    fn test_round_trip_at_zero_interval() {
        let segments = vec![
            TranscriptSegment::new(0.0, 2.345, "first"),
            TranscriptSegment::new(2.345, 7.5, "second & third"),
            TranscriptSegment::new(9.001, 12.0, "a <b> tag"),
            TranscriptSegment::new(12.0, 1499.999, "long tail"),
        ];
        let t = transcript(segments.clone(), 1500.0);

        let spans = parse_anchors(&inject_anchors(&t, 0.0).text).unwrap();
        let recovered: Vec<TranscriptSegment> = spans
            .into_iter()
            .map(|s| TranscriptSegment::new(s.start_seconds, s.end_seconds, s.text))
            .collect();
        assert_eq!(recovered, segments);
    }

    #[test]
    fn test_spoken_markup_is_escaped() {
        let t = transcript(vec![TranscriptSegment::new(0.0, 1.0, "x <t=5> & y")], 1.0);
        let anchored = inject_anchors(&t, 30.0);
        assert_eq!(anchored.text, "<t=0> x &lt;t=5> &amp; y <t=1>");
        assert_eq!(anchored.anchors, vec![0.0, 1.0]);
    }

    #[test]
    fn test_empty_transcript_has_terminal_anchor() {
        let anchored = inject_anchors(&transcript(vec![], 12.0), 30.0);
        assert_eq!(anchored.text, "<t=12>");
        assert!(parse_anchors(&anchored.text).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_markers_are_rejected() {
        assert!(parse_anchors("<t=abc> words <t=1>").is_err());
        assert!(parse_anchors("<t=0> words <t=1").is_err());
        assert!(parse_anchors("stray <t=0> words <t=1>").is_err());
        assert!(parse_anchors("<t=0> words").is_err());
    }
}
