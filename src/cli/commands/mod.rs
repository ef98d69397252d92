//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod docs;
mod doctor;
mod serve;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use docs::{run_docs, run_models};
pub use doctor::run_doctor;
pub use serve::run_serve;

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;

/// Check the configuration and open the warehouse session.
///
/// Failures are reported to the user and returned; nothing else runs
/// without a connection.
pub(crate) async fn connect(settings: Settings) -> anyhow::Result<Orchestrator> {
    if let Err(e) = preflight::check(&settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'docchat doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let spinner = Output::spinner("Connecting to the warehouse...");
    let result = Orchestrator::connect(settings).await;
    spinner.finish_and_clear();

    match result {
        Ok(orchestrator) => Ok(orchestrator),
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'docchat doctor' for detailed diagnostics.");
            Err(e.into())
        }
    }
}
