//! CLI command implementations.

mod ask;
mod chapters;
mod collections;
mod config;
mod process;
mod reindex;
mod search;
mod videos;

pub use ask::run_ask;
pub use chapters::run_chapters;
pub use collections::run_collections;
pub use config::run_config;
pub use process::run_process;
pub use reindex::{run_reindex, run_resegment};
pub use search::run_search;
pub use videos::run_videos;

use crate::config::Settings;

/// The collection given on the command line, or the configured default.
fn collection_or_default(collection: Option<&str>, settings: &Settings) -> String {
    collection
        .map(str::to_string)
        .unwrap_or_else(|| settings.retrieval.default_collection.clone())
}
