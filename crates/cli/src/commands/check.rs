//! `check` command implementation.

use anyhow::{Context, Result};
use contracts::ContractError;
use serde::Serialize;
use tracing::info;

use crate::cli::CheckArgs;

#[derive(Serialize)]
struct CheckResult {
    valid: bool,
    expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the `check` command
pub fn run_check(args: &CheckArgs) -> Result<()> {
    info!(expr = %args.expr, "Checking filter expression");

    let result = check_expression(&args.expr);

    if args.json {
        let json =
            serde_json::to_string_pretty(&result).context("Failed to serialize check result")?;
        println!("{json}");
    } else {
        print_check_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Filter expression is invalid")
    }
}

fn check_expression(expr: &str) -> CheckResult {
    match filter_lang::compile(expr) {
        Ok(_) => CheckResult {
            valid: true,
            expression: expr.to_string(),
            position: None,
            error: None,
        },
        Err(e) => CheckResult {
            valid: false,
            expression: expr.to_string(),
            position: match &e {
                ContractError::FilterSyntax { position, .. } => Some(*position),
                _ => None,
            },
            error: Some(e.to_string()),
        },
    }
}

fn print_check_result(result: &CheckResult) {
    if result.valid {
        println!("✓ Filter is valid: {}", result.expression);
        return;
    }

    println!("✗ Filter is invalid");
    println!("\n  {}", result.expression);
    if let Some(position) = result.position {
        let column = result
            .expression
            .get(..position)
            .map_or(0, |prefix| prefix.chars().count());
        println!("  {}^", " ".repeat(column));
    }
    if let Some(ref error) = result.error {
        println!("\n  Error: {error}");
    }
}
