//! Resegment and reindex command implementations.

use super::collection_or_default;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the resegment command.
pub async fn run_resegment(
    video_id: &str,
    collection: Option<&str>,
    target_chapters: Option<usize>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Model)?;

    let collection = collection_or_default(collection, &settings);
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner(&format!("Resegmenting {}...", video_id));
    let result = orchestrator.resegment(video_id, &collection, target_chapters).await;
    spinner.finish_and_clear();

    match result {
        Ok(result) => {
            Output::success(&format!(
                "Resegmented '{}' into {} chapters ({} indexed in '{}')",
                result.video_id,
                result.chapters.len(),
                result.indexed,
                result.collection
            ));
            for (i, chapter) in result.chapters.iter().enumerate() {
                Output::chapter(i, chapter);
            }
            println!();
        }
        Err(e) => {
            Output::error(&format!("Resegmenting failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}

/// Run the reindex command.
pub async fn run_reindex(video_id: &str, collection: Option<&str>, settings: Settings) -> Result<()> {
    preflight::check(Operation::Model)?;

    let collection = collection_or_default(collection, &settings);
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner(&format!("Reindexing {}...", video_id));
    let result = orchestrator.reindex(video_id, &collection).await;
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            if report.created_collection {
                Output::info(&format!("Created collection '{}'", report.collection));
            }
            Output::success(&format!(
                "Indexed {} chapters of '{}' into '{}'",
                report.indexed, video_id, report.collection
            ));
        }
        Err(e) => {
            Output::error(&format!("Reindexing failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
