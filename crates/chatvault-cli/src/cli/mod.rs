//! CLI command definitions and dispatch for the `cvault` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod maintenance;
pub mod message;
pub mod prune;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use dialoguer::Confirm;

/// Inspect and maintain a local chat store.
#[derive(Parser)]
#[command(name = "cvault", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file to open instead of the one in the data directory.
    #[arg(long, global = true, env = "CHATVAULT_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List a user's chat sessions, most recent first.
    #[command(alias = "ls")]
    Sessions {
        /// User id.
        user: String,
    },

    /// Show the messages of a session in chronological order.
    Messages {
        /// Session id.
        session: String,
    },

    /// Delete messages of offline-only sessions past the retention window.
    Prune {
        /// Retention window in days (defaults to the configured value).
        #[arg(long)]
        days: Option<u32>,

        /// Keep running and prune on the configured interval until Ctrl-C.
        #[arg(long)]
        watch: bool,
    },

    /// Delete every session of a user together with their messages.
    PurgeUser {
        /// User id.
        user: String,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Delete all sessions and messages and reclaim disk space.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Validate the schema and run the storage integrity checks.
    Check,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Ask before a destructive command. Only `--yes` skips the prompt.
pub(crate) fn confirm(prompt: String, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}
