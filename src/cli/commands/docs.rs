//! Document and model listing commands.

use super::connect;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::retrieval::StagedDocument;
use anyhow::Result;

/// Run the docs command.
pub async fn run_docs(settings: Settings) -> Result<()> {
    let orchestrator = connect(settings).await?;

    let outcome = print_documents(&orchestrator).await;
    orchestrator.close().await.ok();
    outcome
}

/// Print the documents in the stage.
pub(crate) async fn print_documents(orchestrator: &Orchestrator) -> Result<()> {
    match orchestrator.list_documents().await {
        Ok(docs) => {
            print_document_list(&docs);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to list documents: {}", e));
            Err(e.into())
        }
    }
}

pub(crate) fn print_document_list(docs: &[StagedDocument]) {
    if docs.is_empty() {
        Output::info("No documents found in the stage yet.");
        return;
    }

    Output::header(&format!("Documents ({})", docs.len()));
    println!();
    for doc in docs {
        Output::document_info(&doc.name, doc.size, doc.last_modified.as_deref());
    }

    let total_bytes: u64 = docs.iter().filter_map(|d| d.size).sum();
    println!();
    Output::kv("Total documents", &docs.len().to_string());
    Output::kv("Total bytes", &total_bytes.to_string());
}

/// Run the models command. Needs no connection.
pub fn run_models(settings: &Settings) -> Result<()> {
    Output::header("Models");
    println!();
    for model in &settings.chat.models {
        if *model == settings.chat.default_model {
            Output::list_item(&format!("{} (default)", model));
        } else {
            Output::list_item(model);
        }
    }
    Ok(())
}
