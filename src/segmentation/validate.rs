//! Structural validation of a proposed chapter sequence.

use super::chapter::{dedup_keywords, ChapterCandidate};
use thiserror::Error;
use tracing::info;

/// A broken chapter-sequence invariant, naming the chapter it was found at.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChapterViolation {
    #[error("no chapters were returned")]
    Empty,

    #[error("chapter {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("chapter {index} ends at {end}s, which is not after its start {start}s")]
    InvertedRange { index: usize, start: f64, end: f64 },

    #[error("chapter {index} starts at {start}s, which is not after the previous chapter's start {previous_start}s")]
    Unordered { index: usize, previous_start: f64, start: f64 },

    #[error("chapter {index} starts at {start}s, before the previous chapter ends at {previous_end}s")]
    Overlap { index: usize, previous_end: f64, start: f64 },

    #[error("gap before chapter {index}: previous chapter ends at {previous_end}s but this one starts at {start}s")]
    Gap { index: usize, previous_end: f64, start: f64 },

    #[error("first chapter starts at {start}s instead of 0")]
    StartNotZero { start: f64 },

    #[error("last chapter ends at {end}s instead of the video end at {duration}s")]
    EndNotDuration { end: f64, duration: f64 },

    #[error("chapter {index} has time {time}s outside the video (0 to {duration}s)")]
    OutOfBounds { index: usize, time: f64, duration: f64 },
}

/// Join violations into one message for logs and correction prompts.
pub fn describe_violations(violations: &[ChapterViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check a chapter sequence against a video of `duration` seconds.
///
/// Boundaries off by at most `tolerance` seconds are snapped to the expected
/// value: 0, the video end, or the next chapter's start when a gap is that
/// small. Overlaps are never snapped.
/// Keywords are de-duplicated. Nothing is reordered or dropped: any remaining
/// problem is reported and the whole sequence is rejected.
pub fn validate_chapters(
    mut chapters: Vec<ChapterCandidate>,
    duration: f64,
    tolerance: f64,
) -> std::result::Result<Vec<ChapterCandidate>, Vec<ChapterViolation>> {
    if chapters.is_empty() {
        return Err(vec![ChapterViolation::Empty]);
    }

    snap_boundaries(&mut chapters, duration, tolerance.max(0.0));

    let mut violations = Vec::new();
    for (index, chapter) in chapters.iter_mut().enumerate() {
        chapter.keywords = dedup_keywords(std::mem::take(&mut chapter.keywords));

        if chapter.title.trim().is_empty() {
            violations.push(ChapterViolation::EmptyField { index, field: "title" });
        }
        if chapter.summary.trim().is_empty() {
            violations.push(ChapterViolation::EmptyField { index, field: "summary" });
        }
        if chapter.keywords.is_empty() {
            violations.push(ChapterViolation::EmptyField { index, field: "keywords" });
        }
    }

    for (index, chapter) in chapters.iter().enumerate() {
        for time in [chapter.start_time, chapter.end_time] {
            if !(0.0..=duration).contains(&time) {
                violations.push(ChapterViolation::OutOfBounds { index, time, duration });
            }
        }
        if chapter.end_time <= chapter.start_time {
            violations.push(ChapterViolation::InvertedRange {
                index,
                start: chapter.start_time,
                end: chapter.end_time,
            });
        }
    }

    for (index, pair) in chapters.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = index + 1;
        if current.start_time <= previous.start_time {
            violations.push(ChapterViolation::Unordered {
                index,
                previous_start: previous.start_time,
                start: current.start_time,
            });
        } else if current.start_time < previous.end_time {
            violations.push(ChapterViolation::Overlap {
                index,
                previous_end: previous.end_time,
                start: current.start_time,
            });
        } else if current.start_time > previous.end_time {
            violations.push(ChapterViolation::Gap {
                index,
                previous_end: previous.end_time,
                start: current.start_time,
            });
        }
    }

    if let Some(first) = chapters.first() {
        if first.start_time != 0.0 {
            violations.push(ChapterViolation::StartNotZero { start: first.start_time });
        }
    }
    if let Some(last) = chapters.last() {
        if last.end_time != duration {
            violations.push(ChapterViolation::EndNotDuration { end: last.end_time, duration });
        }
    }

    if violations.is_empty() {
        Ok(chapters)
    } else {
        Err(violations)
    }
}

fn snap_boundaries(chapters: &mut [ChapterCandidate], duration: f64, tolerance: f64) {
    let within = |a: f64, b: f64| a != b && (a - b).abs() <= tolerance;

    if let Some(first) = chapters.first_mut() {
        if within(first.start_time, 0.0) {
            info!("Snapping first chapter start {}s to 0", first.start_time);
            first.start_time = 0.0;
        }
    }

    for index in 1..chapters.len() {
        let next_start = chapters[index].start_time;
        let previous = &mut chapters[index - 1];
        if previous.end_time < next_start && within(previous.end_time, next_start) {
            info!(
                "Closing gap: chapter {} end {}s extended to next start {}s",
                index - 1,
                previous.end_time,
                next_start
            );
            previous.end_time = next_start;
        }
    }

    if let Some(last) = chapters.last_mut() {
        if within(last.end_time, duration) {
            info!("Snapping last chapter end {}s to video end {}s", last.end_time, duration);
            last.end_time = duration;
        }
    }
}
