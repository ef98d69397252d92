//! Configuration module for docchat.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChatPrompts, Prompts};
pub use settings::{
    ChatSettings, GeneralSettings, PromptSettings, RetrievalSettings, Settings,
    WarehouseSettings, DEFAULT_MODELS,
};
