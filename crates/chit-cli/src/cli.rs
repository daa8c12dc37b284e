//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chit - Scan receipts, track spending
#[derive(Parser)]
#[command(name = "chit")]
#[command(about = "Self-hosted receipt scanner and expense tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "chit.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CHIT_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires auth proxy headers or API keys.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Run a receipt image through the processing pipeline
    Process {
        /// Image file to process
        #[arg(short, long)]
        file: PathBuf,

        /// User the receipt belongs to
        #[arg(short, long, default_value = "local@chit.dev")]
        user: String,
    },

    /// Ask the agent a question about stored receipts
    Ask {
        /// Question to ask (e.g., "how much did I spend on groceries?")
        question: String,

        /// User whose receipts to query
        #[arg(short, long, default_value = "local@chit.dev")]
        user: String,
    },

    /// Manage stored receipts (list, delete)
    Receipts {
        #[command(subcommand)]
        action: Option<ReceiptsAction>,
    },

    /// Show database status and backend health
    Status,

    /// Show recent audit log entries
    Audit {
        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum ReceiptsAction {
    /// List recent receipts
    List {
        /// Maximum receipts to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// User whose receipts to list
        #[arg(short, long, default_value = "local@chit.dev")]
        user: String,
    },

    /// Delete a receipt by id
    Delete {
        /// Receipt id
        id: i64,

        /// User the receipt belongs to
        #[arg(short, long, default_value = "local@chit.dev")]
        user: String,
    },
}
