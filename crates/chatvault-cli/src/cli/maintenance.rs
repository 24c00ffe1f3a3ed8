//! Store-wide CLI commands: reset and check.

use anyhow::{Context, Result};
use console::style;

use chatvault_core::repository::MaintenanceRepository;
use chatvault_infra::sqlite::schema::SCHEMA_VERSION;

use super::confirm;
use crate::state::AppState;

/// Delete every session and message, with confirmation.
///
/// # Examples
///
/// ```bash
/// cvault reset
/// cvault reset --yes
/// ```
pub async fn reset(state: &AppState, yes: bool, json: bool, quiet: bool) -> Result<()> {
    let prompt = format!(
        "Delete {} chat data in {}?",
        style("ALL").red().bold(),
        state.store.path().display()
    );
    if !confirm(prompt, yes)? {
        println!("  Cancelled.");
        return Ok(());
    }

    state
        .store
        .maintenance()
        .clear_all_tables()
        .await
        .context("failed to clear the chat store")?;

    if json {
        println!("{}", serde_json::json!({"cleared": true}));
    } else if !quiet {
        println!("  {} All chat data deleted.", style("x").red().bold());
    }

    Ok(())
}

/// Validate the schema and run the integrity checks.
///
/// Exits with an error when any check fails.
pub async fn check(state: &AppState, json: bool) -> Result<()> {
    let schema = state.store.validate_schema().await;
    let report = state
        .store
        .maintenance()
        .integrity_check()
        .await
        .context("failed to run integrity check")?;

    let healthy = schema.is_ok() && report.is_healthy();

    if json {
        let check = serde_json::json!({
            "path": state.store.path().display().to_string(),
            "data_dir": state.data_dir.display().to_string(),
            "schema_version": SCHEMA_VERSION,
            "schema_ok": schema.is_ok(),
            "schema_error": schema.as_ref().err().map(|e| e.to_string()),
            "foreign_keys_enabled": report.foreign_keys_enabled,
            "problems": report.problems,
            "healthy": healthy,
        });
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else {
        println!();
        println!(
            "  Health check for {}",
            style(state.store.path().display()).cyan()
        );
        println!(
            "  {}",
            style(format!("data directory: {}", state.data_dir.display())).dim()
        );
        println!();
        let check_mark = |ok: bool| {
            if ok {
                format!("{}", style("✓").green())
            } else {
                format!("{}", style("✗").red())
            }
        };
        println!(
            "  {} Schema version {SCHEMA_VERSION} matches",
            check_mark(schema.is_ok())
        );
        if let Err(err) = &schema {
            println!("      {}", style(err).dim());
        }
        println!(
            "  {} Foreign keys enforced",
            check_mark(report.foreign_keys_enabled)
        );
        println!(
            "  {} Storage integrity",
            check_mark(report.problems.is_empty())
        );
        for problem in &report.problems {
            println!("      {}", style(problem).dim());
        }
        println!();
    }

    if !healthy {
        anyhow::bail!("chat store failed its health check");
    }
    Ok(())
}
