//! Ask command implementation.

use super::connect;
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    model: Option<String>,
    num_chunks: Option<usize>,
    show_sources: bool,
    mut settings: Settings,
) -> Result<()> {
    if let Some(k) = num_chunks {
        settings.retrieval.num_chunks = k;
    }

    let orchestrator = connect(settings).await?;

    let mut session = orchestrator.new_session();
    if let Some(model) = model {
        orchestrator.select_model(&mut session, &model)?;
    }

    let spinner = Output::spinner(&format!("{} thinking...", session.model_name));
    let outcome = orchestrator.engine().respond(&mut session, question).await;
    spinner.finish_and_clear();
    orchestrator.close().await.ok();

    match outcome {
        Ok(turn) => {
            println!("\n{}\n", turn.format_for_display());

            if show_sources && !turn.sources.is_empty() {
                Output::header("Sources");
                for source in &turn.sources {
                    Output::source(&source.relative_path, source.similarity, &source.chunk);
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            Err(e.into())
        }
    }
}
