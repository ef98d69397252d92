//! Doctor command - verify configuration and warehouse access.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::warehouse::{validate_identifier, validate_model_name, SnowflakeConnection, Warehouse};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks against the config at `config_path`, or the default location.
pub async fn run_doctor(settings: &Settings, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::default_config_path);

    Output::header("docchat Doctor");
    println!();
    println!("Checking configuration and warehouse access...\n");

    let mut checks = Vec::new();

    let config_checks = vec![check_config_file(&config_path)];
    print_section("Configuration", &config_checks);
    checks.extend(config_checks);

    let credential_checks = check_credentials(settings);
    print_section("Credentials", &credential_checks);
    checks.extend(credential_checks);

    let object_checks = check_objects(settings);
    print_section("Objects", &object_checks);
    checks.extend(object_checks);

    // Only try the network once the configuration itself is sound.
    if checks.iter().all(|c| c.status != CheckStatus::Error) {
        let warehouse_checks = check_warehouse(settings).await;
        print_section("Warehouse", &warehouse_checks);
        checks.extend(warehouse_checks);
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before chatting.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! docchat is ready to use.");
    }

    Ok(())
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults and environment",
            "Create with: docchat config edit",
        )
    }
}

/// Check the login parameters.
fn check_credentials(settings: &Settings) -> Vec<CheckResult> {
    let wh = &settings.warehouse;
    let mut results = Vec::new();

    let required = [
        ("Account", "SNOWFLAKE_ACCOUNT", wh.account.clone()),
        ("User", "SNOWFLAKE_USER", wh.user.clone()),
    ];
    for (name, var, value) in required {
        if value.is_empty() && !(name == "Account" && wh.base_url.is_some()) {
            results.push(CheckResult::error(
                name,
                "not set",
                &format!("Set warehouse.{} or {}", name.to_lowercase(), var),
            ));
        } else if value.is_empty() {
            results.push(CheckResult::ok(name, "using base_url override"));
        } else {
            results.push(CheckResult::ok(name, &value));
        }
    }

    if wh.password.is_empty() {
        results.push(CheckResult::error(
            "Password",
            "not set",
            "Set warehouse.password or SNOWFLAKE_PASSWORD",
        ));
    } else {
        results.push(CheckResult::ok("Password", "configured (hidden)"));
    }

    let optional = [
        ("Role", &wh.role),
        ("Warehouse", &wh.warehouse),
        ("Database", &wh.database),
        ("Schema", &wh.schema),
    ];
    for (name, value) in optional {
        match value {
            Some(v) => results.push(CheckResult::ok(name, v)),
            None => results.push(CheckResult::warning(
                name,
                "not set, the user's default applies",
                &format!("Set warehouse.{} to pin it", name.to_lowercase()),
            )),
        }
    }

    results
}

/// Check names that end up in SQL and the model selection.
fn check_objects(settings: &Settings) -> Vec<CheckResult> {
    let r = &settings.retrieval;
    let mut results = Vec::new();

    results.push(match validate_identifier(&r.chunk_table) {
        Ok(name) => CheckResult::ok("Chunk table", name),
        Err(e) => CheckResult::error("Chunk table", &e.to_string(), "Use a plain or qualified table name"),
    });
    results.push(match validate_identifier(r.stage.trim_start_matches('@')) {
        Ok(name) => CheckResult::ok("Stage", &format!("@{}", name)),
        Err(e) => CheckResult::error("Stage", &e.to_string(), "Use a plain or qualified stage name"),
    });
    results.push(match validate_model_name(&r.embedding_model) {
        Ok(name) => CheckResult::ok("Embedding model", name),
        Err(e) => CheckResult::error("Embedding model", &e.to_string(), "e.g. e5-base-v2"),
    });

    if settings.is_known_model(&settings.chat.default_model) {
        results.push(CheckResult::ok("Default model", &settings.chat.default_model));
    } else {
        results.push(CheckResult::error(
            "Default model",
            &format!("'{}' is not in chat.models", settings.chat.default_model),
            "Add it to chat.models or pick one from the list",
        ));
    }

    if r.drop_least_similar {
        results.push(CheckResult::warning(
            "Chunk selection",
            &format!(
                "using {} of {} retrieved chunks",
                r.num_chunks.saturating_sub(1),
                r.num_chunks
            ),
            "Set retrieval.drop_least_similar = false to use all of them",
        ));
    } else {
        results.push(CheckResult::ok(
            "Chunk selection",
            &format!("{} chunks per question", r.num_chunks),
        ));
    }

    results
}

/// Connect and probe the stage and the chunk table.
async fn check_warehouse(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let connection = match SnowflakeConnection::connect(&settings.warehouse).await {
        Ok(conn) => {
            results.push(CheckResult::ok("Connection", "login succeeded"));
            Arc::new(conn)
        }
        Err(e) => {
            results.push(CheckResult::error(
                "Connection",
                &e.to_string(),
                "Check account, user and password",
            ));
            return results;
        }
    };

    let warehouse: Arc<dyn Warehouse> = connection;
    let orchestrator = match Orchestrator::with_components(settings.clone(), warehouse.clone()) {
        Ok(o) => o,
        Err(e) => {
            results.push(CheckResult::error("Setup", &e.to_string(), "Check the configuration"));
            warehouse.close().await.ok();
            return results;
        }
    };

    match orchestrator.list_documents().await {
        Ok(docs) if docs.is_empty() => results.push(CheckResult::warning(
            "Stage",
            "no documents",
            &format!("Upload files to @{}", settings.retrieval.stage.trim_start_matches('@')),
        )),
        Ok(docs) => results.push(CheckResult::ok("Stage", &format!("{} document(s)", docs.len()))),
        Err(e) => results.push(CheckResult::error(
            "Stage",
            &e.to_string(),
            "Check the stage name and the role's privileges",
        )),
    }

    match orchestrator.chunk_count().await {
        Ok(0) => results.push(CheckResult::warning(
            "Chunk table",
            "empty",
            "Chunk and embed the documents first",
        )),
        Ok(count) => results.push(CheckResult::ok("Chunk table", &format!("{} chunk(s)", count))),
        Err(e) => results.push(CheckResult::error(
            "Chunk table",
            &e.to_string(),
            "Check the table name and the role's privileges",
        )),
    }

    orchestrator.close().await.ok();
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_config_file_uses_given_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        assert_eq!(check_config_file(&path).status, CheckStatus::Warning);

        std::fs::write(&path, "[chat]\nslide_window = 5\n").unwrap();
        let found = check_config_file(&path);
        assert_eq!(found.status, CheckStatus::Ok);
        assert!(found.message.contains("custom.toml"));
    }

    #[test]
    fn test_missing_credentials_are_errors() {
        let checks = check_credentials(&Settings::default());
        let errors: Vec<&str> = checks
            .iter()
            .filter(|c| c.status == CheckStatus::Error)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(errors, vec!["Account", "User", "Password"]);
    }

    #[test]
    fn test_password_never_printed() {
        let mut settings = Settings::default();
        settings.warehouse.password = "hunter2".to_string();
        let checks = check_credentials(&settings);
        assert!(checks.iter().all(|c| !c.message.contains("hunter2")));
    }

    #[test]
    fn test_drop_least_similar_is_flagged() {
        let mut settings = Settings::default();
        settings.retrieval.drop_least_similar = true;
        let checks = check_objects(&settings);
        let selection = checks.iter().find(|c| c.name == "Chunk selection").unwrap();
        assert_eq!(selection.status, CheckStatus::Warning);
        assert!(selection.message.contains("2 of 3"));
    }
}
