//! Retention prune CLI commands.

use anyhow::{Context, Result};
use console::style;
use tokio_util::sync::CancellationToken;
use tracing::info;

use chatvault_core::retention::RetentionPolicy;

use crate::state::AppState;

/// Prune offline-only messages older than the retention window once.
///
/// # Examples
///
/// ```bash
/// cvault prune
/// cvault prune --days 30
/// ```
pub async fn prune_now(state: &AppState, days: Option<u32>, json: bool, quiet: bool) -> Result<()> {
    let policy = match days {
        Some(days) => RetentionPolicy::new(days),
        None => RetentionPolicy::from_config(&state.store.config().retention),
    };

    let deleted = state
        .store
        .pruner(policy)
        .run_now()
        .await
        .context("failed to prune offline messages")?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "retention_days": policy.offline_retention_days,
                "deleted_messages": deleted,
            })
        );
    } else if !quiet {
        println!(
            "  {} Pruned {} offline message{} older than {} days.",
            style("✓").green().bold(),
            deleted,
            if deleted == 1 { "" } else { "s" },
            policy.offline_retention_days
        );
    }

    Ok(())
}

/// Run the background prune task until Ctrl-C.
pub async fn watch(state: &AppState, quiet: bool) -> Result<()> {
    let retention = &state.store.config().retention;
    if !quiet {
        println!(
            "  {} Pruning every {}s with a {} day window. Press Ctrl-C to stop.",
            style("i").blue().bold(),
            retention.prune_interval_secs,
            retention.offline_retention_days
        );
    }

    let cancel = CancellationToken::new();
    let handle = state.store.spawn_pruner(cancel.clone());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("stopping prune task");
    cancel.cancel();
    handle.await.context("prune task panicked")?;

    Ok(())
}
