//! Search command implementation.

use super::collection_or_default;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    collection: Option<&str>,
    k: Option<usize>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Model)?;

    let collection = collection_or_default(collection, &settings);
    let k = k.unwrap_or(settings.retrieval.top_k);
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.retrieve(query, &collection, k).await;
    spinner.finish_and_clear();

    match results {
        Ok(hits) => {
            if hits.is_empty() {
                Output::warning(&format!("No chapters in '{}' matched your query.", collection));
            } else {
                Output::success(&format!("Found {} chapters in '{}'", hits.len(), collection));
                for (i, hit) in hits.iter().enumerate() {
                    Output::search_result(i, hit);
                }
                println!();
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
