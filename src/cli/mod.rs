//! CLI module for docchat.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// docchat - Chat with the documents in your warehouse
///
/// Answers questions from document chunks ranked by vector similarity inside
/// Snowflake, using Cortex completion models.
#[derive(Parser, Debug)]
#[command(name = "docchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "DOCCHAT_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Model to start with
        #[arg(short, long)]
        model: Option<String>,

        /// Don't include chat history in prompts
        #[arg(long)]
        no_history: bool,

        /// Show the standalone query used to search the documents
        #[arg(long)]
        debug: bool,
    },

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Model to use for the answer
        #[arg(short, long)]
        model: Option<String>,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long)]
        num_chunks: Option<usize>,

        /// Print the chunks used as context
        #[arg(long)]
        show_sources: bool,
    },

    /// List the documents available for answering questions
    Docs,

    /// List the models the chat can use
    Models,

    /// Check configuration and warehouse connectivity
    Doctor,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration (password redacted)
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
