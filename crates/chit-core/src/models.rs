//! Domain types shared across the pipeline, database, and API layers
//!
//! Absent values are modeled with `Option`, never with magic strings.
//! The one place a sentinel appears is display rendering: an unknown
//! merchant is shown as "unknown" and an unknown date as "N/A", but those
//! strings never enter the data model or the database.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when a receipt's merchant could not be read
pub const UNKNOWN_MERCHANT: &str = "unknown";

/// Display value used when a receipt's purchase date could not be read
pub const UNKNOWN_DATE: &str = "N/A";

/// A receipt as produced by the OCR extraction stage
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedReceipt {
    /// Merchant name, if the provider recognized one
    pub merchant: Option<String>,
    /// Purchase timestamp (date-only receipts get midnight)
    pub purchased_at: Option<NaiveDateTime>,
    /// Number of detected line items
    pub item_count: i64,
    /// Resolved total; 0.0 when every resolution strategy failed
    pub total: f64,
    /// Provider confidence for this receipt document, clamped to [0, 1]
    pub ocr_confidence: f64,
}

impl ExtractedReceipt {
    /// Merchant name for display ("unknown" when absent)
    pub fn display_merchant(&self) -> &str {
        self.merchant.as_deref().unwrap_or(UNKNOWN_MERCHANT)
    }

    /// Purchase timestamp for display ("N/A" when absent)
    pub fn display_date(&self) -> String {
        match self.purchased_at {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => UNKNOWN_DATE.to_string(),
        }
    }
}

/// Category assignment produced by the classification stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    /// Final confidence after history boost and refinement, in [0, 1]
    pub confidence: f64,
}

/// A receipt row ready for insertion
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub merchant: Option<String>,
    pub purchased_at: Option<NaiveDateTime>,
    pub item_count: i64,
    pub category: String,
    pub total: Option<f64>,
    pub image_url: Option<String>,
    pub user_email: String,
    pub ocr_confidence: Option<f64>,
    pub classification_confidence: Option<f64>,
}

/// A stored receipt row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub id: i64,
    pub merchant: Option<String>,
    pub purchased_at: Option<NaiveDateTime>,
    pub item_count: i64,
    pub category: String,
    pub total: Option<f64>,
    pub image_url: Option<String>,
    pub user_email: String,
    pub ocr_confidence: Option<f64>,
    pub classification_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// API-facing view of a processed receipt
///
/// This is the shape returned from the upload endpoint and the CLI, with
/// absent fields rendered for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedReceipt {
    pub id: i64,
    pub merchant: String,
    pub purchased_at: Option<String>,
    pub item_count: i64,
    pub category: String,
    pub total: f64,
    pub confidence: f64,
    pub image_url: Option<String>,
}

/// Merchant purchase history for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantHistory {
    /// Lowercased merchant name
    pub merchant: String,
    /// Number of stored receipts for this merchant
    pub frequency: i64,
    /// Average spend over receipts with a recorded total
    pub avg_spend: f64,
}

/// Compact receipt summary kept in session memory
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSummary {
    pub merchant: String,
    pub category: String,
    pub total: f64,
    pub purchased_at: Option<String>,
}

impl ReceiptSummary {
    /// Key used for the per-session receipt map
    pub fn key(&self) -> String {
        format!(
            "{}_{}",
            self.merchant,
            self.purchased_at.as_deref().unwrap_or(UNKNOWN_DATE)
        )
    }
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_email: String,
    pub action: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}
