//! chatvault CLI entry point.
//!
//! Binary name: `cvault`
//!
//! Parses CLI arguments, opens the chat store, then dispatches to the
//! appropriate command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use chatvault_observe::{LogFormat, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chatvault_infra=debug,chatvault_core=debug",
        _ => "trace",
    };
    let format = if cli.json { LogFormat::Json } else { LogFormat::Text };
    let enable_otel = std::env::var_os("CHATVAULT_OTEL").is_some();
    init_tracing(filter, format, enable_otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need the store
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "cvault", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.db.as_deref()).await?;

    let result = match cli.command {
        Commands::Sessions { user } => cli::session::list_sessions(&state, &user, cli.json).await,
        Commands::Messages { session } => {
            cli::message::list_messages(&state, &session, cli.json).await
        }
        Commands::Prune { days, watch } => {
            if watch {
                cli::prune::watch(&state, cli.quiet).await
            } else {
                cli::prune::prune_now(&state, days, cli.json, cli.quiet).await
            }
        }
        Commands::PurgeUser { user, yes } => {
            cli::session::purge_user(&state, &user, yes, cli.json, cli.quiet).await
        }
        Commands::Reset { yes } => {
            cli::maintenance::reset(&state, yes, cli.json, cli.quiet).await
        }
        Commands::Check => cli::maintenance::check(&state, cli.json).await,
        Commands::Completions { .. } => Ok(()),
    };

    state.store.close().await;
    shutdown_tracing();
    result
}
