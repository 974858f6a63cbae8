//! Chapters command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::open_store;
use anyhow::Result;

/// Run the chapters command.
pub async fn run_chapters(video_id: &str, settings: Settings) -> Result<()> {
    let (_, artifacts) = open_store(&settings)?;

    match artifacts.load_chapters(video_id).await? {
        Some(chapters) => {
            Output::header(&format!("{} ({} chapters)", video_id, chapters.len()));
            for (i, chapter) in chapters.iter().enumerate() {
                Output::chapter(i, chapter);
            }
            println!();
        }
        None => {
            Output::warning(&format!("No chapters stored for '{}'.", video_id));
            Output::info("Use 'kapittel process <video>' to create them.");
        }
    }

    Ok(())
}
