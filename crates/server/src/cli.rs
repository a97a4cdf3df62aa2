//! CLI argument parsing.

use clap::{Parser, Subcommand};

/// Tender alert service: matches tenders to users and sends WhatsApp alerts.
#[derive(Parser, Debug)]
#[command(name = "tender-server", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Run the pipeline once, wait for every dispatch, print the match group.
    Run {
        /// Log messages instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },
}
