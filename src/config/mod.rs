//! Configuration module for Kapittel.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts, SegmentationPrompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, PromptSettings, RagSettings, RetrievalSettings,
    RetrySettings, SegmentationSettings, Settings, TranscriptionSettings, VectorStoreSettings,
};
