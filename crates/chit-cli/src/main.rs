//! Chit CLI - Receipt scanner and expense tracker
//!
//! Usage:
//!   chit init                    Initialize database
//!   chit process --file IMG      Run a receipt image through the pipeline
//!   chit ask "QUESTION"          Ask the agent about stored receipts
//!   chit serve --port 3000       Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
        Commands::Process { file, user } => {
            commands::cmd_process(&cli.db, &file, &user, cli.no_encrypt).await
        }
        Commands::Ask { question, user } => {
            commands::cmd_ask(&cli.db, &question, &user, cli.no_encrypt).await
        }
        Commands::Receipts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_receipts_list(&db, commands::DEFAULT_USER, 20),
                Some(ReceiptsAction::List { limit, user }) => {
                    commands::cmd_receipts_list(&db, &user, limit)
                }
                Some(ReceiptsAction::Delete { id, user }) => {
                    commands::cmd_receipts_delete(&db, &user, id)
                }
            }
        }
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt).await,
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_audit(&db, limit)
        }
    }
}
