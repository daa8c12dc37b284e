//! Database layer tests

use chrono::NaiveDate;

use crate::models::NewReceipt;

use super::Database;

const USER: &str = "test@example.com";

fn test_db() -> Database {
    Database::in_memory().expect("in-memory db")
}

fn receipt(merchant: Option<&str>, date: Option<(i32, u32, u32)>, category: &str, total: Option<f64>) -> NewReceipt {
    NewReceipt {
        merchant: merchant.map(String::from),
        purchased_at: date.map(|(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        }),
        item_count: 2,
        category: category.to_string(),
        total,
        image_url: Some("/receipts/test.jpg".to_string()),
        user_email: USER.to_string(),
        ocr_confidence: Some(0.9),
        classification_confidence: Some(0.8),
    }
}

fn seed(db: &Database) {
    let rows = [
        receipt(Some("Corner Deli"), Some((2024, 6, 1)), "Food & Beverage", Some(25.0)),
        receipt(Some("Corner Deli"), Some((2024, 6, 8)), "Food & Beverage", Some(15.0)),
        receipt(Some("Corner Deli"), Some((2024, 7, 2)), "Food & Beverage", Some(20.0)),
        receipt(Some("Acme Market"), Some((2024, 6, 3)), "Groceries", Some(80.0)),
        receipt(Some("City Transit"), Some((2024, 6, 5)), "Transport", Some(3.50)),
        receipt(Some("Mega Electronics"), Some((2023, 11, 20)), "High Value - Electronics", Some(450.0)),
    ];
    for row in &rows {
        db.insert_receipt(row).expect("insert");
    }
}

#[test]
fn test_insert_returns_distinct_ids() {
    let db = test_db();
    let a = db.insert_receipt(&receipt(Some("A"), None, "Other", Some(1.0))).unwrap();
    let b = db.insert_receipt(&receipt(Some("B"), None, "Other", Some(2.0))).unwrap();
    assert!(b > a);
}

#[test]
fn test_round_trip_preserves_nulls() {
    let db = test_db();
    let id = db
        .insert_receipt(&receipt(None, None, "Other", None))
        .unwrap();

    let stored = db.get_receipt(USER, id).unwrap();
    assert_eq!(stored.merchant, None);
    assert_eq!(stored.purchased_at, None);
    assert_eq!(stored.total, None);
    assert_eq!(stored.category, "Other");
    assert_eq!(stored.user_email, USER);
}

#[test]
fn test_round_trip_full_row() {
    let db = test_db();
    let id = db
        .insert_receipt(&receipt(Some("Corner Deli"), Some((2024, 6, 15)), "Food & Beverage", Some(21.5)))
        .unwrap();

    let stored = db.get_receipt(USER, id).unwrap();
    assert_eq!(stored.merchant.as_deref(), Some("Corner Deli"));
    assert_eq!(
        stored.purchased_at.unwrap().date(),
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    );
    assert_eq!(stored.total, Some(21.5));
    assert_eq!(stored.ocr_confidence, Some(0.9));
    assert_eq!(stored.classification_confidence, Some(0.8));
}

#[test]
fn test_get_receipt_wrong_user() {
    let db = test_db();
    let id = db.insert_receipt(&receipt(Some("A"), None, "Other", Some(1.0))).unwrap();
    assert!(db.get_receipt("other@example.com", id).is_err());
}

#[test]
fn test_list_receipts_scoped_and_limited() {
    let db = test_db();
    seed(&db);

    let all = db.list_receipts(USER, 100).unwrap();
    assert_eq!(all.len(), 6);

    let limited = db.list_receipts(USER, 2).unwrap();
    assert_eq!(limited.len(), 2);

    let other = db.list_receipts("other@example.com", 100).unwrap();
    assert!(other.is_empty());
}

#[test]
fn test_delete_receipt() {
    let db = test_db();
    let id = db.insert_receipt(&receipt(Some("A"), None, "Other", Some(1.0))).unwrap();

    // Wrong user cannot delete
    assert!(!db.delete_receipt("other@example.com", id).unwrap());
    assert!(db.delete_receipt(USER, id).unwrap());
    assert!(!db.delete_receipt(USER, id).unwrap());
    assert_eq!(db.count_receipts(USER).unwrap(), 0);
}

#[test]
fn test_merchant_history_case_insensitive() {
    let db = test_db();
    seed(&db);

    let history = db.merchant_history(USER, "corner deli").unwrap().unwrap();
    assert_eq!(history.merchant, "corner deli");
    assert_eq!(history.frequency, 3);
    assert!((history.avg_spend - 20.0).abs() < 1e-9);

    let upper = db.merchant_history(USER, "CORNER DELI").unwrap().unwrap();
    assert_eq!(upper.frequency, 3);
}

#[test]
fn test_merchant_history_unseen() {
    let db = test_db();
    seed(&db);
    assert!(db.merchant_history(USER, "Nowhere Cafe").unwrap().is_none());
}

#[test]
fn test_merchant_history_ignores_null_totals_in_average() {
    let db = test_db();
    db.insert_receipt(&receipt(Some("Kiosk"), None, "Other", Some(10.0))).unwrap();
    db.insert_receipt(&receipt(Some("Kiosk"), None, "Other", None)).unwrap();

    let history = db.merchant_history(USER, "Kiosk").unwrap().unwrap();
    // Frequency counts all visits; the average skips the NULL total
    assert_eq!(history.frequency, 2);
    assert!((history.avg_spend - 10.0).abs() < 1e-9);
}

#[test]
fn test_merchant_spend_substring() {
    let db = test_db();
    seed(&db);

    let (total, count) = db.merchant_spend(USER, "deli").unwrap();
    assert!((total - 60.0).abs() < 1e-9);
    assert_eq!(count, 3);

    let (none_total, none_count) = db.merchant_spend(USER, "nonexistent").unwrap();
    assert_eq!(none_total, 0.0);
    assert_eq!(none_count, 0);
}

#[test]
fn test_category_spend_matches_refined_categories() {
    let db = test_db();
    seed(&db);

    // "Electronics" should also pick up "High Value - Electronics" rows
    let (total, count) = db.category_spend(USER, "Electronics", None).unwrap();
    assert!((total - 450.0).abs() < 1e-9);
    assert_eq!(count, 1);
}

#[test]
fn test_category_spend_recency_window() {
    let db = test_db();
    seed(&db);

    // All seeded purchases are in the past; a 1-day window sees none of them
    let (total, count) = db.category_spend(USER, "Food & Beverage", Some(1)).unwrap();
    assert_eq!(total, 0.0);
    assert_eq!(count, 0);
}

#[test]
fn test_total_spend_filters() {
    let db = test_db();
    seed(&db);

    let (all, all_count) = db.total_spend(USER, None, None, None).unwrap();
    assert!((all - 593.5).abs() < 1e-9);
    assert_eq!(all_count, 6);

    let (y2024, c2024) = db.total_spend(USER, Some(2024), None, None).unwrap();
    assert!((y2024 - 143.5).abs() < 1e-9);
    assert_eq!(c2024, 5);

    let (june, june_count) = db.total_spend(USER, Some(2024), Some(6), None).unwrap();
    assert!((june - 123.5).abs() < 1e-9);
    assert_eq!(june_count, 4);
}

#[test]
fn test_monthly_summary_grouped() {
    let db = test_db();
    seed(&db);

    let summary = db.monthly_summary(USER, 2024, 6).unwrap();
    assert_eq!(summary.len(), 3);
    // Ordered by total descending
    assert_eq!(summary[0].category, "Groceries");
    assert!((summary[0].total_spend - 80.0).abs() < 1e-9);
    assert_eq!(summary[1].category, "Food & Beverage");
    assert!((summary[1].total_spend - 40.0).abs() < 1e-9);
    assert_eq!(summary[2].category, "Transport");
}

#[test]
fn test_category_breakdown_by_year() {
    let db = test_db();
    seed(&db);

    let all = db.category_breakdown(USER, None).unwrap();
    assert_eq!(all.len(), 4);

    let y2023 = db.category_breakdown(USER, Some(2023)).unwrap();
    assert_eq!(y2023.len(), 1);
    assert_eq!(y2023[0].category, "High Value - Electronics");
}

#[test]
fn test_merchant_totals_ordered_by_spend() {
    let db = test_db();
    seed(&db);

    let merchants = db.merchant_totals(USER).unwrap();
    assert_eq!(merchants.len(), 4);
    assert_eq!(merchants[0].merchant, "Mega Electronics");
    for pair in merchants.windows(2) {
        assert!(pair[0].total_spend >= pair[1].total_spend);
    }

    let deli = merchants.iter().find(|m| m.merchant == "Corner Deli").unwrap();
    assert_eq!(deli.visit_count, 3);
    assert!((deli.total_spend - 60.0).abs() < 1e-9);
}

#[test]
fn test_audit_log_round_trip() {
    let db = test_db();
    db.log_audit(USER, "receipt_upload", Some("test.jpg")).unwrap();
    db.log_audit(USER, "ask_query", None).unwrap();

    let entries = db.list_audit(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "ask_query");
    assert_eq!(entries[1].detail.as_deref(), Some("test.jpg"));
}
