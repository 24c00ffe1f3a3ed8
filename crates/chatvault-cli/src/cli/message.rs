//! Message CLI commands.

use anyhow::{Context, Result};
use console::style;

use chatvault_core::repository::{MessageRepository, SessionRepository};
use chatvault_types::chat::MessageRole;

use super::session::format_millis;
use crate::state::AppState;

/// Print the messages of a session in chronological order.
///
/// # Examples
///
/// ```bash
/// cvault messages 0192f0c4-...
/// cvault messages 0192f0c4-... --json
/// ```
pub async fn list_messages(state: &AppState, session_id: &str, json: bool) -> Result<()> {
    let session = state
        .store
        .sessions()
        .get_session(session_id)
        .await?
        .with_context(|| format!("Session '{session_id}' not found"))?;

    let messages = state.store.messages().list_messages(session_id).await?;

    if json {
        let export = serde_json::json!({
            "session": session,
            "messages": messages,
        });
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&session.title).cyan().bold(),
        style(format!("({} messages)", messages.len())).dim()
    );
    println!();

    for msg in &messages {
        let label = match msg.role {
            MessageRole::User => style("You").green().bold(),
            MessageRole::Model | MessageRole::Assistant => style("Model").magenta().bold(),
            MessageRole::System => style("System").yellow().bold(),
        };
        println!("  {label} {}", style(format_millis(msg.timestamp)).dim());
        for line in msg.content.lines() {
            println!("    {line}");
        }
        if let Some(image) = &msg.image_path {
            println!("    {}", style(format!("[image: {image}]")).dim());
        }
        println!();
    }

    Ok(())
}
