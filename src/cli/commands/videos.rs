//! Videos command implementation.

use crate::cli::output::format_duration;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::open_store;
use anyhow::Result;

/// Run the videos command.
pub async fn run_videos(settings: Settings) -> Result<()> {
    let (_, artifacts) = open_store(&settings)?;

    let videos = artifacts.list_videos().await?;
    if videos.is_empty() {
        Output::info("No videos processed yet. Use 'kapittel process <video>' to add one.");
        return Ok(());
    }

    Output::header(&format!("Videos ({})", videos.len()));
    for video in &videos {
        let chapters = video
            .chapter_count
            .map(|n| format!("{} chapters", n))
            .unwrap_or_else(|| "not segmented".to_string());
        Output::list_item(&format!(
            "{} ({}, {} segments, {})",
            video.video_id,
            format_duration(video.duration_seconds),
            video.segment_count,
            chapters
        ));
    }

    Ok(())
}
