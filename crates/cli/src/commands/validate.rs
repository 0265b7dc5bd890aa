//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    filter: String,
    async_workers: usize,
    source_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn invalid(config_path: String, error: String) -> ValidationResult {
    ValidationResult {
        valid: false,
        config_path,
        error: Some(error),
        warnings: None,
        summary: None,
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return invalid(config_path, format!("File not found: {}", args.config.display()));
    }

    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(config_path, e.to_string()),
    };

    // The loader only checks the expression is present; compile it too
    if let Err(e) = filter_lang::compile(&blueprint.filter.expression) {
        return invalid(config_path, e.to_string());
    }

    let warnings = collect_warnings(&blueprint);
    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: (!warnings.is_empty()).then_some(warnings),
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            filter: blueprint.filter.expression.clone(),
            async_workers: blueprint.dispatcher.async_workers,
            source_count: blueprint.sources.len(),
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sources.is_empty() {
        warnings.push(
            "No sources configured - evt.source / evt.event_source never match".to_string(),
        );
    }

    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    if blueprint.dispatcher.async_workers > cores {
        warnings.push(format!(
            "dispatcher.async_workers ({}) exceeds available parallelism ({cores})",
            blueprint.dispatcher.async_workers
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Filter: {}", summary.filter);
            println!("  Async workers: {}", summary.async_workers);
            println!("  Sources: {}", summary.source_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn args(path: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config: path,
            json: true,
        }
    }

    #[test]
    fn test_valid_config() {
        let file = config_file(
            "[filter]\nexpression = \"evt.num > 0\"\n\n[[sources]]\nid = 1\nname = \"k8saudit\"\n",
        );
        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(result.valid, "{:?}", result.error);
        assert_eq!(result.summary.unwrap().source_count, 1);
    }

    #[test]
    fn test_bad_filter_is_invalid() {
        let file = config_file("[filter]\nexpression = \"invalid!!syntax\"\n");
        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("filter syntax error"));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/pipeline.toml")));
        assert!(!result.valid);
    }

    #[test]
    fn test_no_sources_warns() {
        let file = config_file("[filter]\nexpression = \"evt.num > 0\"\n");
        let result = validate_config(&args(file.path().to_path_buf()));
        assert!(result.valid);
        assert!(result.warnings.unwrap()[0].contains("No sources"));
    }
}
