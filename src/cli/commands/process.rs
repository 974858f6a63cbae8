//! Process command implementation.

use super::collection_or_default;
use crate::cli::output::format_duration;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, ProcessOptions};
use anyhow::Result;
use std::path::Path;

/// Run the process command.
pub async fn run_process(
    video: &Path,
    collection: Option<&str>,
    options: ProcessOptions,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Process) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    if !video.exists() {
        Output::error(&format!("File not found: {}", video.display()));
        anyhow::bail!("File not found: {}", video.display());
    }

    let collection = collection_or_default(collection, &settings);
    let orchestrator = Orchestrator::new(settings)?.with_progress(true);

    Output::info(&format!("Processing {} into '{}'", video.display(), collection));

    match orchestrator.process_video(video, &collection, &options).await {
        Ok(result) => {
            if result.reused_transcript {
                Output::info("Reused stored transcript (use --force to transcribe again)");
            }
            if result.reused_chapters {
                Output::info("Reused stored chapters");
            }

            Output::success(&format!(
                "Indexed {} chapters of '{}'",
                result.indexed, result.video_id
            ));
            Output::kv("Duration", &format_duration(result.duration_seconds));
            Output::kv("Segments", &result.segment_count.to_string());
            Output::kv("Collection", &result.collection);

            Output::header("Chapters");
            for (i, chapter) in result.chapters.iter().enumerate() {
                Output::chapter(i, chapter);
            }
            println!();
        }
        Err(e) => {
            Output::error(&format!("Processing failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
