//! docchat CLI entry point.

use anyhow::Result;
use clap::Parser;
use docchat::cli::{commands, Cli, Commands};
use docchat::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging; -v flags win over the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("docchat={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match &cli.command {
        Commands::Chat {
            model,
            no_history,
            debug,
        } => {
            commands::run_chat(model.clone(), *no_history, *debug, settings).await?;
        }

        Commands::Ask {
            question,
            model,
            num_chunks,
            show_sources,
        } => {
            commands::run_ask(question, model.clone(), *num_chunks, *show_sources, settings).await?;
        }

        Commands::Docs => {
            commands::run_docs(settings).await?;
        }

        Commands::Models => {
            commands::run_models(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, config_path).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
