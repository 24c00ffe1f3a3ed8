//! Session CLI commands: list and purge.

use anyhow::{Context, Result};
use chrono::DateTime;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use chatvault_core::repository::{MessageRepository, SessionRepository};

use super::confirm;
use crate::state::AppState;

/// List a user's sessions, most recently updated first.
///
/// # Examples
///
/// ```bash
/// cvault sessions alice
/// cvault sessions alice --json
/// ```
pub async fn list_sessions(state: &AppState, user: &str, json: bool) -> Result<()> {
    let sessions = state
        .store
        .sessions()
        .list_sessions(user)
        .await
        .with_context(|| format!("failed to list sessions of '{user}'"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions found for '{}'.",
            style("i").blue().bold(),
            style(user).cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("Messages").fg(Color::White),
        Cell::new("Mode").fg(Color::White),
    ]);

    for session in &sessions {
        let title_display = if session.title.chars().count() > 40 {
            format!("{}...", session.title.chars().take(37).collect::<String>())
        } else {
            session.title.clone()
        };

        let count = state.store.messages().count_messages(&session.id).await?;

        let mode_cell = if session.is_offline_only {
            Cell::new("offline").fg(Color::Yellow)
        } else {
            Cell::new("online").fg(Color::Green)
        };

        table.add_row(vec![
            Cell::new(&session.id).fg(Color::DarkGrey),
            Cell::new(title_display).fg(Color::Cyan),
            Cell::new(format_millis(session.last_updated)).fg(Color::White),
            Cell::new(count.to_string()).fg(Color::White),
            mode_cell,
        ]);
    }

    println!();
    println!("  Sessions for '{}'", style(user).cyan().bold());
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Delete every session of a user, with confirmation.
///
/// # Examples
///
/// ```bash
/// cvault purge-user alice
/// cvault purge-user alice --yes
/// ```
pub async fn purge_user(state: &AppState, user: &str, yes: bool, json: bool, quiet: bool) -> Result<()> {
    let sessions = state.store.sessions().list_sessions(user).await?;

    let prompt = format!(
        "Delete all {} session(s) of '{}' and their messages?",
        sessions.len(),
        style(user).red().bold()
    );
    if !confirm(prompt, yes)? {
        println!("  Cancelled.");
        return Ok(());
    }

    let deleted = state
        .store
        .sessions()
        .delete_sessions_for_user(user)
        .await
        .with_context(|| format!("failed to delete sessions of '{user}'"))?;

    if json {
        println!("{}", serde_json::json!({"user_id": user, "deleted_sessions": deleted}));
    } else if !quiet {
        println!(
            "  {} Deleted {} session{} of '{}'.",
            style("x").red().bold(),
            deleted,
            if deleted == 1 { "" } else { "s" },
            user
        );
    }

    Ok(())
}

// --- Formatting helpers ---

/// Render epoch millis as a UTC date and time.
pub(crate) fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}
