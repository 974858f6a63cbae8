//! RAG (Retrieval-Augmented Generation) over a chapter collection.
//!
//! The [`Retriever`] finds matching chapters and re-slices their verbatim
//! transcript text; the [`Answerer`] turns that grounded context into an
//! answer with numbered citations.

mod answer;
mod retriever;

pub use answer::{Answer, Answerer, NO_CONTEXT_ANSWER};
pub use retriever::{RetrievedChapter, Retriever};

/// Format retrieved chapters as numbered excerpts for a prompt.
pub fn format_context_for_prompt(chapters: &[RetrievedChapter]) -> String {
    chapters
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "---\n[{}] {} ({} @ {})\n{}\n---",
                i + 1,
                hit.chapter.title,
                hit.chapter.video_id,
                hit.chapter.time_range(),
                hit.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::Chapter;

    fn hit(title: &str, start: f64, end: f64, text: &str) -> RetrievedChapter {
        RetrievedChapter {
            chapter: Chapter {
                id: "v-000".to_string(),
                collection_id: "c".to_string(),
                video_id: "v".to_string(),
                title: title.to_string(),
                summary: "summary".to_string(),
                keywords: vec![],
                start_seconds: start,
                end_seconds: end,
            },
            score: 0.875,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_prompt_context_is_numbered() {
        let context = format_context_for_prompt(&[
            hit("Intro", 0.0, 65.0, "hello there"),
            hit("Ownership", 65.0, 190.0, "moves and borrows"),
        ]);
        assert!(context.starts_with("---\n[1] Intro (v @ 00:00-01:05)\nhello there\n---"));
        assert!(context.contains("[2] Ownership (v @ 01:05-03:10)\nmoves and borrows"));
    }
}
