//! User-scoped spending aggregates
//!
//! These queries back the agent's read-only tools and the report endpoints.
//! All of them filter by user_email; totals ignore NULL amounts via SUM
//! semantics and are coalesced to 0.0 for empty result sets.

use rusqlite::params;
use serde::Serialize;

use crate::error::Result;

use super::Database;

/// Spend total for one category
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_spend: f64,
    pub receipt_count: i64,
}

/// Spend total and visit count for one merchant
#[derive(Debug, Clone, Serialize)]
pub struct MerchantTotal {
    pub merchant: String,
    pub total_spend: f64,
    pub visit_count: i64,
}

impl Database {
    /// Total spend at merchants matching a name fragment (case-insensitive)
    pub fn merchant_spend(&self, user_email: &str, merchant: &str) -> Result<(f64, i64)> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", merchant.trim().to_lowercase());

        let row = conn.query_row(
            "SELECT COALESCE(SUM(total), 0.0), COUNT(*)
             FROM receipts
             WHERE user_email = ?1
               AND merchant IS NOT NULL
               AND LOWER(merchant) LIKE ?2",
            params![user_email, pattern],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(row)
    }

    /// Total spend in a category, optionally limited to the last N days.
    ///
    /// The category should already be alias-normalized; matching is a
    /// case-insensitive substring so "High Value - Transport" rows count
    /// toward "Transport".
    pub fn category_spend(
        &self,
        user_email: &str,
        category: &str,
        last_n_days: Option<i64>,
    ) -> Result<(f64, i64)> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", category.trim().to_lowercase());

        let row = match last_n_days {
            Some(days) => {
                let cutoff = format!("-{} days", days);
                conn.query_row(
                    "SELECT COALESCE(SUM(total), 0.0), COUNT(*)
                     FROM receipts
                     WHERE user_email = ?1
                       AND LOWER(category) LIKE ?2
                       AND purchased_at >= datetime('now', ?3)",
                    params![user_email, pattern, cutoff],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?
            }
            None => conn.query_row(
                "SELECT COALESCE(SUM(total), 0.0), COUNT(*)
                 FROM receipts
                 WHERE user_email = ?1
                   AND LOWER(category) LIKE ?2",
                params![user_email, pattern],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?,
        };

        Ok(row)
    }

    /// Overall spend, optionally restricted by year, month, or recency window
    pub fn total_spend(
        &self,
        user_email: &str,
        year: Option<i32>,
        month: Option<u32>,
        last_n_days: Option<i64>,
    ) -> Result<(f64, i64)> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT COALESCE(SUM(total), 0.0), COUNT(*)
             FROM receipts
             WHERE user_email = ?1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_email.to_string())];

        if let Some(y) = year {
            sql.push_str(&format!(
                " AND strftime('%Y', purchased_at) = ?{}",
                args.len() + 1
            ));
            args.push(Box::new(format!("{:04}", y)));
        }
        if let Some(m) = month {
            sql.push_str(&format!(
                " AND strftime('%m', purchased_at) = ?{}",
                args.len() + 1
            ));
            args.push(Box::new(format!("{:02}", m)));
        }
        if let Some(days) = last_n_days {
            sql.push_str(&format!(
                " AND purchased_at >= datetime('now', ?{})",
                args.len() + 1
            ));
            args.push(Box::new(format!("-{} days", days)));
        }

        let row = conn.query_row(
            &sql,
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(row)
    }

    /// Per-category totals for one calendar month
    pub fn monthly_summary(
        &self,
        user_email: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<CategoryTotal>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT category, COALESCE(SUM(total), 0.0), COUNT(*)
             FROM receipts
             WHERE user_email = ?1
               AND strftime('%Y', purchased_at) = ?2
               AND strftime('%m', purchased_at) = ?3
             GROUP BY category
             ORDER BY SUM(total) DESC",
        )?;

        let rows = stmt
            .query_map(
                params![user_email, format!("{:04}", year), format!("{:02}", month)],
                row_to_category_total,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Per-category totals, optionally for one year
    pub fn category_breakdown(
        &self,
        user_email: &str,
        year: Option<i32>,
    ) -> Result<Vec<CategoryTotal>> {
        let conn = self.conn()?;

        let rows = match year {
            Some(y) => {
                let mut stmt = conn.prepare(
                    "SELECT category, COALESCE(SUM(total), 0.0), COUNT(*)
                     FROM receipts
                     WHERE user_email = ?1
                       AND strftime('%Y', purchased_at) = ?2
                     GROUP BY category
                     ORDER BY SUM(total) DESC",
                )?;
                let rows = stmt
                    .query_map(
                        params![user_email, format!("{:04}", y)],
                        row_to_category_total,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT category, COALESCE(SUM(total), 0.0), COUNT(*)
                     FROM receipts
                     WHERE user_email = ?1
                     GROUP BY category
                     ORDER BY SUM(total) DESC",
                )?;
                let rows = stmt
                    .query_map(params![user_email], row_to_category_total)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(rows)
    }

    /// All merchants with spend and visit counts, highest spend first
    pub fn merchant_totals(&self, user_email: &str) -> Result<Vec<MerchantTotal>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT merchant, COALESCE(SUM(total), 0.0), COUNT(*)
             FROM receipts
             WHERE user_email = ?1 AND merchant IS NOT NULL
             GROUP BY merchant
             ORDER BY SUM(total) DESC",
        )?;

        let rows = stmt
            .query_map(params![user_email], |row| {
                Ok(MerchantTotal {
                    merchant: row.get(0)?,
                    total_spend: row.get(1)?,
                    visit_count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn row_to_category_total(row: &rusqlite::Row<'_>) -> rusqlite::Result<CategoryTotal> {
    Ok(CategoryTotal {
        category: row.get(0)?,
        total_spend: row.get(1)?,
        receipt_count: row.get(2)?,
    })
}
