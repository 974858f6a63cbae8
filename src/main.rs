//! Kapittel CLI entry point.

use anyhow::Result;
use clap::Parser;
use kapittel::cli::{commands, Cli, Commands};
use kapittel::config::Settings;
use kapittel::orchestrator::ProcessOptions;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("kapittel={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.temp_dir())?;

    // Execute command
    match &cli.command {
        Commands::Process {
            video,
            collection,
            force,
            chapters,
            language,
        } => {
            let options = ProcessOptions {
                force: *force,
                target_chapters: *chapters,
                language: language.clone(),
            };
            commands::run_process(video, collection.as_deref(), options, settings).await?;
        }

        Commands::Chapters { video_id } => {
            commands::run_chapters(video_id, settings).await?;
        }

        Commands::Resegment {
            video_id,
            collection,
            chapters,
        } => {
            commands::run_resegment(video_id, collection.as_deref(), *chapters, settings).await?;
        }

        Commands::Reindex { video_id, collection } => {
            commands::run_reindex(video_id, collection.as_deref(), settings).await?;
        }

        Commands::Search { query, collection, k } => {
            commands::run_search(query, collection.as_deref(), *k, settings).await?;
        }

        Commands::Ask {
            question,
            collection,
            k,
            model,
        } => {
            commands::run_ask(question, collection.as_deref(), *k, model.clone(), settings).await?;
        }

        Commands::Collections { action } => {
            commands::run_collections(action, settings).await?;
        }

        Commands::Videos => {
            commands::run_videos(settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
