//! Configuration settings for docchat.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Models offered by the model selector unless the config overrides the list.
pub const DEFAULT_MODELS: &[&str] = &[
    "mixtral-8x7b",
    "snowflake-arctic",
    "mistral-large",
    "llama3-8b",
    "llama3-70b",
    "reka-flash",
    "mistral-7b",
    "llama2-70b-chat",
    "gemma-7b",
];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub warehouse: WarehouseSettings,
    pub retrieval: RetrievalSettings,
    pub chat: ChatSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Warehouse connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Account identifier (e.g. "myorg-myaccount").
    pub account: String,
    pub user: String,
    pub password: String,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    /// Overrides the URL derived from the account identifier.
    pub base_url: Option<String>,
    /// Timeout for the login request, in seconds.
    pub login_timeout_secs: Option<u64>,
}

/// Similarity search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Table holding the precomputed chunks and their vectors.
    pub chunk_table: String,
    /// Stage holding the source documents.
    pub stage: String,
    /// Cortex embedding model used for the question.
    pub embedding_model: String,
    /// Number of chunks fetched from the similarity query.
    pub num_chunks: usize,
    /// Leave the least similar of the fetched chunks out of the context.
    pub drop_least_similar: bool,
    /// Attach a presigned link to the most relevant document.
    pub include_document_link: bool,
    /// Lifetime of presigned document links, in seconds.
    pub presigned_url_expiry_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_table: "docs_chunks_table".to_string(),
            stage: "docs".to_string(),
            embedding_model: "e5-base-v2".to_string(),
            num_chunks: 3,
            drop_least_similar: false,
            include_document_link: false,
            presigned_url_expiry_secs: 360,
        }
    }
}

/// Chat behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Model selected when a session starts.
    pub default_model: String,
    /// Models the user may switch to.
    pub models: Vec<String>,
    /// Number of messages considered for history (including the current question).
    pub slide_window: usize,
    /// Whether new sessions include chat history.
    pub use_chat_history: bool,
    /// Whether new sessions report the standalone query.
    pub debug: bool,
    /// Rewrite follow-up questions into standalone queries before retrieval.
    pub condense_question: bool,
    /// Timeout for each remote call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_model: "mixtral-8x7b".to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            slide_window: 7,
            use_chat_history: true,
            debug: false,
            condense_question: true,
            request_timeout_secs: 300,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Warehouse credentials found in `SNOWFLAKE_*` environment variables
    /// take precedence over the file.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Overlay warehouse parameters from a variable lookup.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let wh = &mut self.warehouse;

        if let Some(v) = get("SNOWFLAKE_ACCOUNT") {
            wh.account = v;
        }
        if let Some(v) = get("SNOWFLAKE_USER") {
            wh.user = v;
        }
        if let Some(v) = get("SNOWFLAKE_PASSWORD") {
            wh.password = v;
        }
        if let Some(v) = get("SNOWFLAKE_ROLE") {
            wh.role = Some(v);
        }
        if let Some(v) = get("SNOWFLAKE_WAREHOUSE") {
            wh.warehouse = Some(v);
        }
        if let Some(v) = get("SNOWFLAKE_DATABASE") {
            wh.database = Some(v);
        }
        if let Some(v) = get("SNOWFLAKE_SCHEMA") {
            wh.schema = Some(v);
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DocChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Copy of these settings that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.warehouse.password.is_empty() {
            copy.warehouse.password = "********".to_string();
        }
        copy
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docchat")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Whether the model selector offers this model.
    pub fn is_known_model(&self, model: &str) -> bool {
        self.chat.models.iter().any(|m| m == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.retrieval.num_chunks, 3);
        assert_eq!(settings.chat.slide_window, 7);
        assert_eq!(settings.chat.default_model, "mixtral-8x7b");
        assert!(settings.chat.use_chat_history);
        assert!(!settings.chat.debug);
        assert!(!settings.retrieval.drop_least_similar);
        assert!(settings.is_known_model("snowflake-arctic"));
        assert!(!settings.is_known_model("gpt-4o"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[warehouse]\naccount = \"acme-prod\"\nuser = \"analyst\"\n\n[retrieval]\nnum_chunks = 5\n",
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();

        // SNOWFLAKE_* variables in the test environment would win over the file.
        if std::env::var("SNOWFLAKE_ACCOUNT").is_err() {
            assert_eq!(settings.warehouse.account, "acme-prod");
        }
        if std::env::var("SNOWFLAKE_USER").is_err() {
            assert_eq!(settings.warehouse.user, "analyst");
        }
        assert_eq!(settings.retrieval.num_chunks, 5);
        assert_eq!(settings.chat.slide_window, 7);
        assert_eq!(settings.retrieval.stage, "docs");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.retrieval.num_chunks, 3);
        assert_eq!(settings.chat.default_model, "mixtral-8x7b");
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval\nnum_chunks = ").unwrap();
        assert!(Settings::load_from(Some(&path)).is_err());
    }

    #[test]
    fn test_env_overrides_win() {
        let mut settings = Settings::default();
        settings.warehouse.user = "from-file".to_string();

        let env: HashMap<&str, &str> = [
            ("SNOWFLAKE_USER", "from-env"),
            ("SNOWFLAKE_PASSWORD", "secret"),
            ("SNOWFLAKE_ROLE", ""),
            ("SNOWFLAKE_SCHEMA", "DATA"),
        ]
        .into_iter()
        .collect();
        settings.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.warehouse.user, "from-env");
        assert_eq!(settings.warehouse.password, "secret");
        assert_eq!(settings.warehouse.role, None);
        assert_eq!(settings.warehouse.schema.as_deref(), Some("DATA"));
    }

    #[test]
    fn test_redacted_hides_password() {
        let mut settings = Settings::default();
        settings.warehouse.password = "hunter2".to_string();
        let shown = toml::to_string_pretty(&settings.redacted()).unwrap();
        assert!(!shown.contains("hunter2"));
        assert_eq!(settings.warehouse.password, "hunter2");
    }
}
