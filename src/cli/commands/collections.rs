//! Collections command implementation.

use crate::cli::{CollectionsAction, Output};
use crate::config::Settings;
use crate::orchestrator::open_store;
use anyhow::Result;

/// Run the collections command.
pub async fn run_collections(action: &CollectionsAction, settings: Settings) -> Result<()> {
    let (store, _) = open_store(&settings)?;

    match action {
        CollectionsAction::List => {
            let collections = store.list_collections().await?;
            if collections.is_empty() {
                Output::info("No collections yet. Use 'kapittel process <video>' to create one.");
                return Ok(());
            }

            Output::header(&format!("Collections ({})", collections.len()));
            for info in &collections {
                Output::list_item(&format!(
                    "{} ({} chapters from {} videos, created {})",
                    info.name,
                    info.entry_count,
                    info.video_count,
                    info.created_at.format("%Y-%m-%d")
                ));
            }
        }

        CollectionsAction::Delete { name } => {
            if store.delete_collection(name).await? {
                Output::success(&format!("Deleted collection '{}'", name));
            } else {
                Output::warning(&format!("Collection '{}' does not exist", name));
            }
        }
    }

    Ok(())
}
