//! CLI command definitions and dispatch for the `driftchat` binary.
//!
//! Uses clap derive macros for argument parsing. The server is started with
//! `driftchat serve`; user accounts are managed with `driftchat user`.

pub mod session;
pub mod user;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Streaming chat backend with durable history.
#[derive(Parser)]
#[command(name = "driftchat", version, about, long_about = None)]
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

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the chat server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8000, env = "DRIFTCHAT_PORT")]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "127.0.0.1", env = "DRIFTCHAT_HOST")]
        host: String,
    },

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: user::UserCommand,
    },

    /// List stored chat sessions.
    Sessions,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
