//! Merchant purchase history
//!
//! Backs the classification confidence boost: a merchant the user visits
//! often is a strong signal that the model's category guess is right.

use rusqlite::params;

use crate::error::Result;
use crate::models::MerchantHistory;

use super::Database;

impl Database {
    /// Look up a user's history with a merchant (case-insensitive).
    ///
    /// Returns None when the user has no stored receipts for the merchant.
    /// The average is taken over receipts with a recorded total only.
    pub fn merchant_history(
        &self,
        user_email: &str,
        merchant: &str,
    ) -> Result<Option<MerchantHistory>> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT LOWER(merchant), COUNT(*), COALESCE(AVG(total), 0.0)
             FROM receipts
             WHERE user_email = ?1
               AND merchant IS NOT NULL
               AND LOWER(merchant) = LOWER(?2)
             GROUP BY LOWER(merchant)",
            params![user_email, merchant.trim()],
            |row| {
                Ok(MerchantHistory {
                    merchant: row.get(0)?,
                    frequency: row.get(1)?,
                    avg_spend: row.get(2)?,
                })
            },
        );

        match result {
            Ok(history) => Ok(Some(history)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
