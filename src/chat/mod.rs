//! Chat-completion collaborator used for chapter segmentation and answers.

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use async_trait::async_trait;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Expected shape of the model's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Free text.
    Text,
    /// A single JSON object.
    Json,
}

/// Trait for chat-completion services.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation and return the reply text.
    async fn complete(&self, messages: &[ChatMessage], mode: ResponseMode) -> Result<String>;

    /// Model name, for logging.
    fn model_name(&self) -> &str;
}
