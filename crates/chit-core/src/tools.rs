//! Agent tool definitions and dispatch
//!
//! Each tool wraps one read-only spending query. Input schemas are
//! derived from the parameter structs, so the definitions sent to the
//! model never drift from what the dispatcher deserializes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::anthropic_compat::Tool;
use crate::categories::normalize_category;
use crate::db::{CategoryTotal, Database, MerchantTotal};
use crate::error::{Error, Result};

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetMerchantSpendParams {
    /// Merchant name or fragment to match, case-insensitive
    #[schemars(description = "Merchant name or fragment, e.g. 'corner deli'")]
    pub merchant: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetCategorySpendParams {
    /// Category name; common aliases like 'food' or 'grocery' are accepted
    #[schemars(description = "Spending category, e.g. 'Groceries' or 'food'")]
    pub category: String,
    #[schemars(description = "Only count purchases from the last N days")]
    #[serde(default)]
    pub last_n_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetTotalSpendParams {
    #[schemars(description = "Restrict to one calendar year, e.g. 2024")]
    pub year: Option<i32>,
    #[schemars(description = "Restrict to one month (1-12); requires year to be meaningful")]
    pub month: Option<u32>,
    #[schemars(description = "Only count purchases from the last N days")]
    pub last_n_days: Option<i64>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetMonthlySummaryParams {
    #[schemars(description = "Calendar year, e.g. 2024")]
    pub year: i32,
    #[schemars(description = "Month number, 1-12")]
    pub month: u32,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetCategoryBreakdownParams {
    #[schemars(description = "Restrict to one calendar year, e.g. 2024")]
    pub year: Option<i32>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetMerchantsParams {}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MerchantSpendResult {
    pub merchant: String,
    pub total_spend: f64,
    pub receipt_count: i64,
}

#[derive(Debug, Serialize)]
pub struct CategorySpendResult {
    pub category: String,
    pub total_spend: f64,
    pub receipt_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_n_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TotalSpendResult {
    pub total_spend: f64,
    pub receipt_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MonthlySummaryResult {
    pub year: i32,
    pub month: u32,
    pub categories: Vec<CategoryTotal>,
}

#[derive(Debug, Serialize)]
pub struct CategoryBreakdownResult {
    pub categories: Vec<CategoryTotal>,
}

#[derive(Debug, Serialize)]
pub struct MerchantsResult {
    pub merchants: Vec<MerchantTotal>,
}

// ============================================================================
// Implementations
// ============================================================================

pub fn get_merchant_spend(
    db: &Database,
    user_email: &str,
    params: GetMerchantSpendParams,
) -> Result<MerchantSpendResult> {
    let (total_spend, receipt_count) = db.merchant_spend(user_email, &params.merchant)?;
    Ok(MerchantSpendResult {
        merchant: params.merchant,
        total_spend,
        receipt_count,
    })
}

pub fn get_category_spend(
    db: &Database,
    user_email: &str,
    params: GetCategorySpendParams,
) -> Result<CategorySpendResult> {
    let category = normalize_category(&params.category);
    let (total_spend, receipt_count) =
        db.category_spend(user_email, &category, params.last_n_days)?;
    Ok(CategorySpendResult {
        category,
        total_spend,
        receipt_count,
        last_n_days: params.last_n_days,
    })
}

pub fn get_total_spend(
    db: &Database,
    user_email: &str,
    params: GetTotalSpendParams,
) -> Result<TotalSpendResult> {
    if let Some(month) = params.month {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidData(format!("Invalid month: {}", month)));
        }
    }
    let (total_spend, receipt_count) =
        db.total_spend(user_email, params.year, params.month, params.last_n_days)?;
    Ok(TotalSpendResult {
        total_spend,
        receipt_count,
        year: params.year,
        month: params.month,
    })
}

pub fn get_monthly_summary(
    db: &Database,
    user_email: &str,
    params: GetMonthlySummaryParams,
) -> Result<MonthlySummaryResult> {
    if !(1..=12).contains(&params.month) {
        return Err(Error::InvalidData(format!("Invalid month: {}", params.month)));
    }
    let categories = db.monthly_summary(user_email, params.year, params.month)?;
    Ok(MonthlySummaryResult {
        year: params.year,
        month: params.month,
        categories,
    })
}

pub fn get_category_breakdown(
    db: &Database,
    user_email: &str,
    params: GetCategoryBreakdownParams,
) -> Result<CategoryBreakdownResult> {
    let categories = db.category_breakdown(user_email, params.year)?;
    Ok(CategoryBreakdownResult { categories })
}

pub fn get_merchants(
    db: &Database,
    user_email: &str,
    _params: GetMerchantsParams,
) -> Result<MerchantsResult> {
    let merchants = db.merchant_totals(user_email)?;
    Ok(MerchantsResult { merchants })
}

// ============================================================================
// Catalog and dispatch
// ============================================================================

/// Tool definitions handed to the agent's model
pub fn agent_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "get_merchant_spend",
            "Get total spending and visit count at a merchant. Matches the \
             merchant name case-insensitively as a substring.",
            schemars::schema_for!(GetMerchantSpendParams).into(),
        ),
        Tool::new(
            "get_category_spend",
            "Get total spending in one category, optionally limited to the \
             last N days. Accepts common aliases like 'food' or 'grocery'.",
            schemars::schema_for!(GetCategorySpendParams).into(),
        ),
        Tool::new(
            "get_total_spend",
            "Get overall spending, optionally filtered by year, month, or a \
             recency window in days.",
            schemars::schema_for!(GetTotalSpendParams).into(),
        ),
        Tool::new(
            "get_monthly_summary",
            "Get per-category spending totals for one calendar month.",
            schemars::schema_for!(GetMonthlySummaryParams).into(),
        ),
        Tool::new(
            "get_category_breakdown",
            "Get spending totals for every category, optionally for one year.",
            schemars::schema_for!(GetCategoryBreakdownParams).into(),
        ),
        Tool::new(
            "get_merchants",
            "List every merchant with total spend and visit count, highest \
             spend first.",
            schemars::schema_for!(GetMerchantsParams).into(),
        ),
    ]
}

/// Execute one tool call on behalf of a user and serialize the result
///
/// The user identity comes from the caller, never from model input.
pub fn execute_tool(db: &Database, user_email: &str, name: &str, input: &Value) -> Result<String> {
    let json = match name {
        "get_merchant_spend" => {
            let params = serde_json::from_value(input.clone())?;
            serde_json::to_string(&get_merchant_spend(db, user_email, params)?)?
        }
        "get_category_spend" => {
            let params = serde_json::from_value(input.clone())?;
            serde_json::to_string(&get_category_spend(db, user_email, params)?)?
        }
        "get_total_spend" => {
            let params = serde_json::from_value(input.clone())?;
            serde_json::to_string(&get_total_spend(db, user_email, params)?)?
        }
        "get_monthly_summary" => {
            let params = serde_json::from_value(input.clone())?;
            serde_json::to_string(&get_monthly_summary(db, user_email, params)?)?
        }
        "get_category_breakdown" => {
            let params = serde_json::from_value(input.clone())?;
            serde_json::to_string(&get_category_breakdown(db, user_email, params)?)?
        }
        "get_merchants" => {
            let params = serde_json::from_value(input.clone())?;
            serde_json::to_string(&get_merchants(db, user_email, params)?)?
        }
        other => return Err(Error::InvalidData(format!("Unknown tool: {}", other))),
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::models::NewReceipt;

    const USER: &str = "test@example.com";

    fn seeded_db() -> Database {
        let db = Database::in_memory().expect("in-memory db");
        let rows = [
            ("Corner Deli", "Food & Beverage", 25.0),
            ("Corner Deli", "Food & Beverage", 15.0),
            ("Acme Market", "Groceries", 80.0),
        ];
        for (merchant, category, total) in rows {
            db.insert_receipt(&NewReceipt {
                merchant: Some(merchant.to_string()),
                purchased_at: NaiveDate::from_ymd_opt(2024, 6, 10)
                    .and_then(|d| d.and_hms_opt(9, 0, 0)),
                item_count: 1,
                category: category.to_string(),
                total: Some(total),
                image_url: None,
                user_email: USER.to_string(),
                ocr_confidence: None,
                classification_confidence: None,
            })
            .expect("insert");
        }
        db
    }

    #[test]
    fn test_catalog_shape() {
        let tools = agent_tools();
        assert_eq!(tools.len(), 6);
        for tool in &tools {
            assert!(!tool.description.is_empty());
            assert!(tool.input_schema.is_object());
        }
        assert!(tools.iter().any(|t| t.name == "get_monthly_summary"));
    }

    #[test]
    fn test_category_spend_normalizes_aliases() {
        let db = seeded_db();
        let result = get_category_spend(
            &db,
            USER,
            GetCategorySpendParams {
                category: "grocery".to_string(),
                last_n_days: None,
            },
        )
        .unwrap();

        assert_eq!(result.category, "Groceries");
        assert!((result.total_spend - 80.0).abs() < 1e-9);
        assert_eq!(result.receipt_count, 1);
    }

    #[test]
    fn test_execute_tool_dispatch() {
        let db = seeded_db();
        let output = execute_tool(
            &db,
            USER,
            "get_merchant_spend",
            &serde_json::json!({"merchant": "deli"}),
        )
        .unwrap();

        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["receipt_count"], 2);
        assert!((value["total_spend"].as_f64().unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_execute_tool_scopes_to_user() {
        let db = seeded_db();
        let output = execute_tool(
            &db,
            "someone-else@example.com",
            "get_total_spend",
            &serde_json::json!({}),
        )
        .unwrap();

        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["receipt_count"], 0);
        assert_eq!(value["total_spend"], 0.0);
    }

    #[test]
    fn test_execute_tool_unknown_name() {
        let db = seeded_db();
        assert!(execute_tool(&db, USER, "drop_table", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_execute_tool_bad_params() {
        let db = seeded_db();
        // merchant is required
        assert!(execute_tool(&db, USER, "get_merchant_spend", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_invalid_month_rejected() {
        let db = seeded_db();
        let err = get_monthly_summary(
            &db,
            USER,
            GetMonthlySummaryParams { year: 2024, month: 13 },
        );
        assert!(err.is_err());
    }
}
