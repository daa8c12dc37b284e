//! Receipt row operations

use rusqlite::params;

use crate::error::{Error, Result};
use crate::models::{NewReceipt, ReceiptRecord};

use super::{parse_datetime, parse_naive_datetime_opt, Database};

impl Database {
    /// Insert a receipt and return its generated id
    ///
    /// The id comes from SQLite's rowid allocation, so concurrent inserts
    /// are safe without any read-before-write.
    pub fn insert_receipt(&self, receipt: &NewReceipt) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO receipts (merchant, purchased_at, item_count, category, total,
                                   image_url, user_email, ocr_confidence, classification_confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                receipt.merchant,
                receipt
                    .purchased_at
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
                receipt.item_count,
                receipt.category,
                receipt.total,
                receipt.image_url,
                receipt.user_email,
                receipt.ocr_confidence,
                receipt.classification_confidence,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Fetch a single receipt for a user
    pub fn get_receipt(&self, user_email: &str, id: i64) -> Result<ReceiptRecord> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT id, merchant, purchased_at, item_count, category, total,
                    image_url, user_email, ocr_confidence, classification_confidence, created_at
             FROM receipts
             WHERE id = ?1 AND user_email = ?2",
            params![id, user_email],
            row_to_receipt,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::NotFound(format!("Receipt {} not found", id))
            }
            other => other.into(),
        })
    }

    /// List a user's receipts, newest first
    pub fn list_receipts(&self, user_email: &str, limit: i64) -> Result<Vec<ReceiptRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, merchant, purchased_at, item_count, category, total,
                    image_url, user_email, ocr_confidence, classification_confidence, created_at
             FROM receipts
             WHERE user_email = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let receipts = stmt
            .query_map(params![user_email, limit], row_to_receipt)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(receipts)
    }

    /// Delete a receipt; returns true if a row was removed
    pub fn delete_receipt(&self, user_email: &str, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM receipts WHERE id = ?1 AND user_email = ?2",
            params![id, user_email],
        )?;
        Ok(deleted > 0)
    }

    /// Count all receipts for a user
    pub fn count_receipts(&self, user_email: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM receipts WHERE user_email = ?1",
            params![user_email],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_receipt(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReceiptRecord> {
    Ok(ReceiptRecord {
        id: row.get(0)?,
        merchant: row.get(1)?,
        purchased_at: parse_naive_datetime_opt(row.get(2)?),
        item_count: row.get(3)?,
        category: row.get(4)?,
        total: row.get(5)?,
        image_url: row.get(6)?,
        user_email: row.get(7)?,
        ocr_confidence: row.get(8)?,
        classification_confidence: row.get(9)?,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}
