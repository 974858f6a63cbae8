//! CLI module for Kapittel.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Kapittel - chaptered, searchable video transcripts
///
/// Transcribes recorded videos, splits them into topic chapters and answers
/// questions from the exact words that were spoken.
/// The name "Kapittel" is the Norwegian word for "chapter."
#[derive(Parser, Debug)]
#[command(name = "kapittel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe, chapter and index a video file
    Process {
        /// Path to the video (or audio) file
        video: PathBuf,

        /// Collection to index into (defaults to retrieval.default_collection)
        #[arg(short = 'C', long)]
        collection: Option<String>,

        /// Ignore the stored transcript and chapters
        #[arg(short, long)]
        force: bool,

        /// Desired number of chapters (a hint for the model)
        #[arg(long)]
        chapters: Option<usize>,

        /// Spoken language (ISO-639-1), detected when omitted
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Show the stored chapters of a video
    Chapters {
        /// Video ID (the file stem used when processing)
        video_id: String,
    },

    /// Re-chapter a stored transcript and index the new chapters
    Resegment {
        /// Video ID to resegment
        video_id: String,

        /// Collection to index into
        #[arg(short = 'C', long)]
        collection: Option<String>,

        /// Desired number of chapters
        #[arg(long)]
        chapters: Option<usize>,
    },

    /// Re-embed stored chapters into a collection without re-segmenting
    Reindex {
        /// Video ID to reindex
        video_id: String,

        /// Collection to index into
        #[arg(short = 'C', long)]
        collection: Option<String>,
    },

    /// Search a collection for matching chapters
    Search {
        /// Search query
        query: String,

        /// Collection to search
        #[arg(short = 'C', long)]
        collection: Option<String>,

        /// Number of chapters to return
        #[arg(short)]
        k: Option<usize>,
    },

    /// Ask a question and get an answer grounded in the transcripts
    Ask {
        /// The question to ask
        question: String,

        /// Collection to search
        #[arg(short = 'C', long)]
        collection: Option<String>,

        /// Number of chapters to use as context
        #[arg(short)]
        k: Option<usize>,

        /// LLM model to use for the answer
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage collections
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },

    /// List videos with a stored transcript
    Videos,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CollectionsAction {
    /// List collections and their sizes
    List,

    /// Delete a collection and all of its entries
    Delete {
        /// Collection name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file if none exists
    Init,
}
