//! docchat - Chat with the documents in your warehouse
//!
//! Answers questions about documents whose chunks and embeddings already
//! live in a Snowflake table. Similarity ranking and text generation both
//! run inside the warehouse; this crate phrases the queries, assembles the
//! prompts and keeps the conversation.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `warehouse` - Connection to the warehouse over its REST protocol
//! - `retrieval` - Similarity search and document listing
//! - `completion` - Text generation with hosted models
//! - `session` - Conversation state
//! - `rag` - Prompt assembly and the per-question flow
//! - `orchestrator` - Wiring shared by the CLI and the HTTP API
//!
//! # Example
//!
//! ```rust,no_run
//! use docchat::config::Settings;
//! use docchat::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::connect(settings).await?;
//!
//!     let mut session = orchestrator.new_session();
//!     let turn = orchestrator
//!         .engine()
//!         .respond(&mut session, "What does the warranty cover?")
//!         .await?;
//!     println!("{}", turn.format_for_display());
//!
//!     orchestrator.close().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod rag;
pub mod retrieval;
pub mod session;
pub mod warehouse;

pub use error::{DocChatError, Result};
