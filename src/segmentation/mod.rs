//! Chapter segmentation.
//!
//! The transcript is rewritten with time anchors, handed to a chat model,
//! and the reply is parsed and validated into an ordered, gap-free chapter
//! sequence covering the whole video.

pub mod anchors;
mod chapter;
mod segmenter;
mod validate;

pub use anchors::{inject_anchors, parse_anchors, AnchoredSpan, AnchoredTranscript};
pub use chapter::{dedup_keywords, parse_chapter_response, Chapter, ChapterCandidate};
pub use segmenter::ChapterSegmenter;
pub use validate::{describe_violations, validate_chapters, ChapterViolation};
