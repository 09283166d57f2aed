use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line options for iboz.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Settings file (defaults to `<config_dir>/iboz/settings.json`).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Keep state in memory for this run only.
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Lifecycle operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the current integration snapshot.
    State,

    /// Store a provider configuration read from a JSON file.
    Configure {
        /// Path to a JSON provider configuration.
        file: PathBuf,
    },

    /// Authenticate against the configured provider.
    ///
    /// The secret is read from `IBOZ_SECRET`, or from the first line of stdin.
    Authenticate {
        /// `oauth` or `appPassword`.
        #[arg(long)]
        method: String,

        /// Account username.
        #[arg(long)]
        username: String,
    },

    /// Sync messages from the provider and print them.
    Fetch,
}
