//! Receipt listing and deletion commands

use anyhow::Result;

use chit_core::db::Database;
use chit_core::models::UNKNOWN_MERCHANT;

use super::truncate;

pub fn cmd_receipts_list(db: &Database, user: &str, limit: i64) -> Result<()> {
    let receipts = db.list_receipts(user, limit)?;

    if receipts.is_empty() {
        println!("No receipts yet. Process one with:");
        println!("  chit process --file receipt.jpg");
        return Ok(());
    }

    println!();
    println!("🧾 Receipts ({})", user);
    println!("   ─────────────────────────────────────────────────────────────");

    for receipt in receipts {
        let merchant = receipt.merchant.as_deref().unwrap_or(UNKNOWN_MERCHANT);
        let date = receipt
            .purchased_at
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let total = receipt
            .total
            .map(|t| format!("${:.2}", t))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   #{:<5} {} {:24} {:20} {:>9}",
            receipt.id,
            date,
            truncate(merchant, 24),
            truncate(&receipt.category, 20),
            total
        );
    }

    println!();
    Ok(())
}

pub fn cmd_receipts_delete(db: &Database, user: &str, id: i64) -> Result<()> {
    if !db.delete_receipt(user, id)? {
        anyhow::bail!("Receipt #{} not found", id);
    }
    db.log_audit(user, "receipt_delete", Some(&id.to_string()))?;
    println!("🗑️  Deleted receipt #{}", id);
    Ok(())
}
