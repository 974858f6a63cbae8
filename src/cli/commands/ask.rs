//! Ask command implementation.

use super::collection_or_default;
use crate::chat::OpenAIChatModel;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    collection: Option<&str>,
    k: Option<usize>,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Model) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let collection = collection_or_default(collection, &settings);
    let k = k.unwrap_or(settings.retrieval.top_k);

    let mut orchestrator = Orchestrator::new(settings)?;
    if let Some(model) = model {
        orchestrator = orchestrator.with_answer_model(Arc::new(OpenAIChatModel::new(&model)?));
    }

    let spinner = Output::spinner("Searching knowledge base...");
    let result = orchestrator.ask(question, &collection, k).await;
    spinner.finish_and_clear();

    match result {
        Ok(answer) => {
            println!("\n{}\n", answer.format_for_display());
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
