//! Chapter model and parsing of the segmentation model's reply.

use crate::error::{KapittelError, Result};
use crate::transcription::format_timestamp;
use serde::{Deserialize, Deserializer, Serialize};

/// A topic-coherent time range of one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Unique ID, `{video_id}-{NNN}`.
    pub id: String,
    /// Collection the chapter is indexed into.
    pub collection_id: String,
    pub video_id: String,
    pub title: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

impl Chapter {
    /// Build the chapter ID for a position in a video's chapter list.
    pub fn make_id(video_id: &str, index: usize) -> String {
        format!("{}-{:03}", video_id, index)
    }

    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// Time range as "MM:SS-MM:SS".
    pub fn time_range(&self) -> String {
        format!(
            "{}-{}",
            format_timestamp(self.start_seconds),
            format_timestamp(self.end_seconds)
        )
    }

    /// Text that is embedded for this chapter.
    pub fn embedding_input(&self) -> String {
        format!("{}\nKeywords: {}", self.summary, self.keywords.join(", "))
    }
}

/// Trim keywords and drop blanks and exact duplicates, keeping the first
/// occurrence.
pub fn dedup_keywords(keywords: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let keyword = keyword.trim().to_string();
        if !keyword.is_empty() && !unique.contains(&keyword) {
            unique.push(keyword);
        }
    }
    unique
}

/// One chapter as proposed by the model, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChapterCandidate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "topic_keywords", deserialize_with = "list_or_comma_string")]
    pub keywords: Vec<String>,
    #[serde(alias = "start_seconds", alias = "start")]
    pub start_time: f64,
    #[serde(alias = "end_seconds", alias = "end")]
    pub end_time: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordsRepr {
    List(Vec<String>),
    Text(String),
}

fn list_or_comma_string<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match KeywordsRepr::deserialize(deserializer)? {
        KeywordsRepr::List(list) => list,
        KeywordsRepr::Text(text) => text
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChapterResponse {
    Wrapped { chapters: Vec<ChapterCandidate> },
    Bare(Vec<ChapterCandidate>),
}

impl From<ChapterResponse> for Vec<ChapterCandidate> {
    fn from(response: ChapterResponse) -> Self {
        match response {
            ChapterResponse::Wrapped { chapters } => chapters,
            ChapterResponse::Bare(chapters) => chapters,
        }
    }
}

/// Parse the model's reply into chapter candidates.
///
/// Accepts `{"chapters": [...]}`, a bare array, and either wrapped in a
/// Markdown code fence or surrounded by prose.
pub fn parse_chapter_response(response: &str) -> Result<Vec<ChapterCandidate>> {
    let body = strip_code_fence(response.trim());

    if let Ok(parsed) = serde_json::from_str::<ChapterResponse>(body) {
        return Ok(parsed.into());
    }

    // Fall back to the outermost JSON array in the reply
    let json_start = body.find('[');
    let json_end = body.rfind(']');
    let json_str = match (json_start, json_end) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => body,
    };

    serde_json::from_str::<Vec<ChapterCandidate>>(json_str).map_err(|e| {
        let preview: String = response.chars().take(500).collect();
        KapittelError::SegmentationParse(format!("{}. Response was: {}", e, preview))
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
