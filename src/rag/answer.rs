//! Grounded answer generation.

use super::{format_context_for_prompt, RetrievedChapter};
use crate::chat::{ChatMessage, ChatModel, ResponseMode};
use crate::config::Prompts;
use crate::error::{KapittelError, Result};
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Returned without a model call when retrieval found nothing.
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in this collection for this question.";

/// An answer with the chapters it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The generated answer.
    pub answer: String,
    /// Retrieved chapters, numbered from 1 as cited in the answer.
    pub sources: Vec<RetrievedChapter>,
}

impl Answer {
    /// Format the answer for display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for (i, source) in self.sources.iter().enumerate() {
                output.push_str(&format!(
                    "\n[{}] {} @ {} ({}, score: {:.2})",
                    i + 1,
                    source.chapter.title,
                    source.chapter.time_range(),
                    source.chapter.video_id,
                    source.score
                ));
            }
        }

        output
    }
}

/// Generates answers from retrieved context.
pub struct Answerer {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
    retry: RetryPolicy,
}

impl Answerer {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryPolicy) -> Self {
        Self {
            model,
            prompts: Prompts::default(),
            retry,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Answer `question` from `context` only.
    #[instrument(skip(self, question, context), fields(question = %question, sources = context.len()))]
    pub async fn answer(
        &self,
        question: &str,
        collection: &str,
        context: Vec<RetrievedChapter>,
    ) -> Result<Answer> {
        if context.is_empty() {
            info!("No context retrieved, skipping generation");
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("collection".to_string(), collection.to_string());
        vars.insert("context".to_string(), format_context_for_prompt(&context));

        let messages = vec![
            ChatMessage::system(self.prompts.render_with_custom(&self.prompts.rag.system, &vars)),
            ChatMessage::user(self.prompts.render_with_custom(&self.prompts.rag.user, &vars)),
        ];

        let answer = self
            .retry
            .run("generate answer", || self.model.complete(&messages, ResponseMode::Text))
            .await
            .map_err(|e| e.error)?;

        if answer.trim().is_empty() {
            return Err(KapittelError::Rag("Empty response from chat model".to_string()));
        }

        debug!("Generated answer with {} sources", context.len());
        Ok(Answer {
            answer: answer.trim().to_string(),
            sources: context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::Chapter;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Echoes a fixed reply and records the prompts it receives.
    struct RecordingChat {
        reply: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        async fn complete(&self, messages: &[ChatMessage], mode: ResponseMode) -> Result<String> {
            assert_eq!(mode, ResponseMode::Text);
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn chat(reply: &str) -> Arc<RecordingChat> {
        Arc::new(RecordingChat {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn source() -> RetrievedChapter {
        RetrievedChapter {
            chapter: Chapter {
                id: "talk-001".to_string(),
                collection_id: "course".to_string(),
                video_id: "talk".to_string(),
                title: "Borrowing".to_string(),
                summary: "A paraphrase.".to_string(),
                keywords: vec!["borrowing".to_string()],
                start_seconds: 60.0,
                end_seconds: 120.0,
            },
            score: 0.9,
            text: "you can have many shared references".to_string(),
        }
    }

    #[tokio::test]
    async fn test_answer_is_grounded_in_context() {
        let chat = chat(" Many shared references are allowed [1, 01:00-02:00]. ");
        let answerer = Answerer::new(chat.clone(), RetryPolicy::immediate(1, Duration::from_secs(5)));

        let answer = answerer
            .answer("How many references?", "course", vec![source()])
            .await
            .unwrap();
        assert_eq!(answer.answer, "Many shared references are allowed [1, 01:00-02:00].");
        assert_eq!(answer.sources.len(), 1);

        let seen = chat.seen.lock().unwrap();
        let user = &seen[0][1].content;
        assert!(user.contains("How many references?"));
        assert!(user.contains("\"course\""));
        assert!(user.contains("[1] Borrowing (talk @ 01:00-02:00)\nyou can have many shared references"));
        assert!(!user.contains("A paraphrase."));
    }

    #[tokio::test]
    async fn test_empty_context_skips_model() {
        let chat = chat("unused");
        let answerer = Answerer::new(chat.clone(), RetryPolicy::immediate(1, Duration::from_secs(5)));

        let answer = answerer.answer("Anything?", "course", vec![]).await.unwrap();
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(chat.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_format_for_display_lists_sources() {
        let answer = Answer {
            answer: "Yes.".to_string(),
            sources: vec![source()],
        };
        assert_eq!(
            answer.format_for_display(),
            "Yes.\n\n--- Sources ---\n\n[1] Borrowing @ 01:00-02:00 (talk, score: 0.90)"
        );
    }
}
