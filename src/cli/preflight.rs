//! Pre-flight checks before connecting.
//!
//! Validates that the configuration can produce a warehouse session before
//! any network traffic happens.

use crate::config::Settings;
use crate::error::{DocChatError, Result};
use crate::warehouse::{validate_identifier, validate_model_name};

/// Run pre-flight checks on the configuration.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(settings: &Settings) -> Result<()> {
    check_credentials(settings)?;
    check_objects(settings)?;
    Ok(())
}

/// Check that the login parameters are present.
fn check_credentials(settings: &Settings) -> Result<()> {
    let wh = &settings.warehouse;
    let missing: Vec<&str> = [
        ("SNOWFLAKE_ACCOUNT", wh.account.is_empty() && wh.base_url.is_none()),
        ("SNOWFLAKE_USER", wh.user.is_empty()),
        ("SNOWFLAKE_PASSWORD", wh.password.is_empty()),
    ]
    .into_iter()
    .filter(|(_, is_missing)| *is_missing)
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DocChatError::Config(format!(
            "missing warehouse credentials: {}. Set them in the config file or environment.",
            missing.join(", ")
        )))
    }
}

/// Check the configured object names before they are spliced into SQL.
fn check_objects(settings: &Settings) -> Result<()> {
    validate_identifier(&settings.retrieval.chunk_table)?;
    validate_identifier(settings.retrieval.stage.trim_start_matches('@'))?;
    validate_model_name(&settings.retrieval.embedding_model)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_all_missing_credentials() {
        let err = check(&Settings::default()).unwrap_err().to_string();
        assert!(err.contains("SNOWFLAKE_ACCOUNT"));
        assert!(err.contains("SNOWFLAKE_USER"));
        assert!(err.contains("SNOWFLAKE_PASSWORD"));
    }

    #[test]
    fn test_passes_with_credentials() {
        let mut settings = Settings::default();
        settings.warehouse.account = "acme".to_string();
        settings.warehouse.user = "analyst".to_string();
        settings.warehouse.password = "secret".to_string();
        assert!(check(&settings).is_ok());

        settings.retrieval.stage = "@docs".to_string();
        assert!(check(&settings).is_ok());

        settings.retrieval.chunk_table = "x y".to_string();
        assert!(check(&settings).is_err());
    }
}
