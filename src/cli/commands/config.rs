//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::PathBuf;

/// Run the config command against `path`, or the default location.
pub fn run_config(action: &ConfigAction, settings: Settings, path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            println!("{}", render_redacted(&settings)?);
        }

        ConfigAction::Edit => {
            if !config_path.exists() {
                // Never write a password that came from the environment.
                let mut initial = settings;
                initial.warehouse.password.clear();
                initial.save_to(&config_path)?;
                Output::info(&format!("Created default config at {:?}", config_path));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor)
                .arg(&config_path)
                .status();

            match status {
                Ok(s) if s.success() => {
                    Output::success("Config saved.");
                }
                Ok(_) => {
                    Output::warning("Editor exited with non-zero status.");
                }
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {:?}", config_path));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

fn render_redacted(settings: &Settings) -> Result<String> {
    toml::to_string_pretty(&settings.redacted())
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_hides_password() {
        let mut settings = Settings::default();
        settings.warehouse.user = "analyst".to_string();
        settings.warehouse.password = "hunter2".to_string();

        let shown = render_redacted(&settings).unwrap();
        assert!(shown.contains("analyst"));
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("[retrieval]"));
    }
}
