//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_status` - Database status and backend health
//! - `cmd_audit` - Recent audit log entries

use std::path::Path;

use anyhow::{Context, Result};

use chit_core::ai::{AnthropicCompatBackend, LlmBackend, LlmClient};
use chit_core::db::{Database, DB_KEY_ENV};
use chit_core::ocr::{OcrBackend, OcrClient};

use super::{truncate, DEFAULT_USER};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let _db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Process a receipt: chit process --file receipt.jpg");
    println!("  2. Start web UI: chit serve");

    Ok(())
}

pub async fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Chit Status");
    println!("   ─────────────────────────────────────────────────────────────");

    // Database path
    println!("   Database: {}", db_path.display());

    // Check if database file exists and get size
    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    // Check encryption status
    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Try to open the database and show stats
    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok(count) = db.count_receipts(DEFAULT_USER) {
                    println!();
                    println!("   Receipts: {}", count);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    // Backend health
    println!();
    match OcrClient::from_env() {
        Some(ocr) => {
            if ocr.health_check().await {
                println!("   📷 OCR backend ({}): connected", ocr.describe());
            } else {
                println!("   ❌ OCR backend ({}): not responding", ocr.describe());
            }
        }
        None => {
            println!("   📷 OCR backend: not configured");
            println!("      Set AZURE_DI_ENDPOINT and AZURE_DI_KEY to enable uploads");
        }
    }

    let llm = LlmClient::from_env();
    if llm.health_check().await {
        println!("   🤖 LLM backend ({} @ {}): connected", llm.model(), llm.host());
    } else {
        println!("   ❌ LLM backend ({}): not responding", llm.host());
    }

    let agent = AnthropicCompatBackend::from_env();
    if agent.health_check().await {
        println!("   💬 Agent backend ({} @ {}): connected", agent.model(), agent.host());
    } else {
        println!("   ❌ Agent backend ({}): not responding", agent.host());
    }

    println!();
    Ok(())
}

pub fn cmd_audit(db: &Database, limit: i64) -> Result<()> {
    let entries = db.list_audit(limit)?;

    if entries.is_empty() {
        println!("No audit entries yet.");
        return Ok(());
    }

    println!();
    println!("📜 Audit Log");
    println!("   ─────────────────────────────────────────────────────────────");

    for entry in entries {
        let detail = entry.detail.as_deref().unwrap_or("-");
        println!(
            "   {} {:24} {:16} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&entry.user_email, 24),
            entry.action,
            truncate(detail, 32)
        );
    }

    println!();
    Ok(())
}
