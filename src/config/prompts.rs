//! Prompt templates for Kapittel.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub segmentation: SegmentationPrompts,
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for chapter segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationPrompts {
    pub system: String,
    pub user: String,
    /// Sent after a rejected answer. Receives {{problem}}.
    pub correction: String,
}

impl Default for SegmentationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert video editor. Segment the transcript into logical chapters.

The transcript has embedded time anchors like <t=12.5>, meaning "the following words are spoken from 12.5 seconds on".
Use these anchors to determine the EXACT start_time and end_time of every chapter.

Rules:
1. Chapters MUST be sequential and non-overlapping: each chapter starts exactly where the previous one ended.
2. start_time must be strictly less than end_time.
3. The first chapter starts at 0 and the last chapter ends at the final anchor of the transcript.
4. Titles should be descriptive topics, not "Part 1".
5. Every chapter needs a 2-3 sentence summary and 3-5 keywords.

Respond with a JSON object only:
{"chapters": [{"title": "...", "summary": "...", "keywords": ["..."], "start_time": 0, "end_time": 95.5}]}"#
                .to_string(),

            user: r#"Video: {{title}}
Total duration: {{duration}} seconds (final anchor <t={{duration}}>)
{{chapter_hint}}
Here is the transcript:

{{transcript}}"#
                .to_string(),

            correction: r#"Your previous answer was rejected: {{problem}}

Fix the chapter boundaries so they are ordered, contiguous and cover 0 to the final anchor, and respond again with the complete JSON object."#
                .to_string(),
        }
    }
}

/// Prompts for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    pub user: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a helpful assistant that answers questions about recorded videos from the user's knowledge base.

Guidelines:
- Answer using only the provided transcript excerpts
- Cite every claim with the excerpt number and time range, e.g. [2, 03:10-05:42]
- If the excerpts don't contain the answer, say so clearly
- Be concise but thorough"#
                .to_string(),

            user: r#"Question: {{question}}

Transcript excerpts from the collection "{{collection}}":

{{context}}

Please answer the question based on the excerpts above."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let segmentation_path = custom_path.join("segmentation.toml");
            if segmentation_path.exists() {
                let content = std::fs::read_to_string(&segmentation_path)?;
                prompts.segmentation = toml::from_str(&content)?;
            }

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.segmentation.system.contains("<t=12.5>"));
        assert!(prompts.segmentation.correction.contains("{{problem}}"));
        assert!(!prompts.rag.system.is_empty());
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_provided_vars_override_custom() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("course".to_string(), "Physics".to_string());
        prompts.variables.insert("title".to_string(), "config".to_string());

        let mut vars = HashMap::new();
        vars.insert("title".to_string(), "lecture-1".to_string());

        let out = prompts.render_with_custom("{{course}}: {{title}}", &vars);
        assert_eq!(out, "Physics: lecture-1");
    }

    #[test]
    fn test_custom_dir_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rag.toml"),
            "system = \"custom system\"\nuser = \"{{question}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.rag.system, "custom system");
        assert!(prompts.segmentation.user.contains("{{transcript}}"));
    }
}
