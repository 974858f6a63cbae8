//! Kapittel - chaptered, searchable video transcripts
//!
//! Turns a recorded video into a queryable knowledge base: a timestamped
//! transcript, topic chapters with summaries and keywords, a per-collection
//! vector index over those chapters, and retrieval that hands back the exact
//! transcript text of every hit.
//!
//! The name "Kapittel" is the Norwegian word for "chapter."
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt management
//! - `audio` - Audio extraction and chunk planning
//! - `transcription` - Chunked speech-to-text and transcript assembly
//! - `segmentation` - Time anchors and chapter segmentation
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector index and artifact storage
//! - `indexer` - Collection lifecycle and chapter indexing
//! - `rag` - Grounded retrieval and answer generation
//! - `retry` - Bounded retries with pluggable backoff
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use kapittel::config::Settings;
//! use kapittel::orchestrator::{Orchestrator, ProcessOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let result = orchestrator
//!         .process_video(Path::new("talk.mp4"), "talks", &ProcessOptions::default())
//!         .await?;
//!     println!("Indexed {} chapters", result.indexed);
//!
//!     for hit in orchestrator.retrieve("how do lifetimes work?", "talks", 3).await? {
//!         println!("{} @ {}: {}", hit.chapter.title, hit.chapter.time_range(), hit.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod retry;
pub mod segmentation;
pub mod transcription;
pub mod vector_store;

pub use error::{KapittelError, Result};
