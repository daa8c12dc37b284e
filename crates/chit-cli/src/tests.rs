//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use chit_core::db::Database;
use chit_core::models::NewReceipt;

use crate::commands::{self, truncate, DEFAULT_USER};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn insert_receipt(db: &Database, user: &str, merchant: &str, category: &str, total: f64) -> i64 {
    db.insert_receipt(&NewReceipt {
        merchant: Some(merchant.to_string()),
        purchased_at: None,
        item_count: 2,
        category: category.to_string(),
        total: Some(total),
        image_url: None,
        user_email: user.to_string(),
        ocr_confidence: Some(0.9),
        classification_confidence: Some(0.8),
    })
    .unwrap()
}

// ========== Shared Utilities ==========

#[test]
fn test_truncate_short() {
    assert_eq!(truncate("short", 10), "short");
}

#[test]
fn test_truncate_exact() {
    assert_eq!(truncate("exactly-10", 10), "exactly-10");
}

#[test]
fn test_truncate_long() {
    assert_eq!(truncate("a much longer string", 10), "a much ...");
}

// ========== Database Commands ==========

#[test]
fn test_open_db_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let db = commands::open_db(&path, true).unwrap();
    assert_eq!(db.count_receipts(DEFAULT_USER).unwrap(), 0);
}

#[test]
fn test_cmd_init_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("init.db");
    let result = commands::cmd_init(&path, true);
    assert!(result.is_ok());
    assert!(path.exists());
}

// ========== Receipts Commands ==========

#[test]
fn test_cmd_receipts_list_empty() {
    let db = setup_test_db();
    let result = commands::cmd_receipts_list(&db, DEFAULT_USER, 20);
    assert!(result.is_ok());
}

#[test]
fn test_cmd_receipts_list_with_rows() {
    let db = setup_test_db();
    insert_receipt(&db, DEFAULT_USER, "Corner Deli", "Food & Beverage", 11.75);
    insert_receipt(&db, DEFAULT_USER, "Green Market", "Groceries", 54.20);

    let result = commands::cmd_receipts_list(&db, DEFAULT_USER, 20);
    assert!(result.is_ok());
}

#[test]
fn test_cmd_receipts_delete() {
    let db = setup_test_db();
    let id = insert_receipt(&db, DEFAULT_USER, "Corner Deli", "Food & Beverage", 11.75);

    let result = commands::cmd_receipts_delete(&db, DEFAULT_USER, id);
    assert!(result.is_ok());
    assert_eq!(db.count_receipts(DEFAULT_USER).unwrap(), 0);
}

#[test]
fn test_cmd_receipts_delete_missing() {
    let db = setup_test_db();
    let result = commands::cmd_receipts_delete(&db, DEFAULT_USER, 999);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[test]
fn test_cmd_receipts_delete_other_user() {
    let db = setup_test_db();
    let id = insert_receipt(&db, "other@chit.dev", "Corner Deli", "Food & Beverage", 11.75);

    // Deleting under a different user must not touch the row
    let result = commands::cmd_receipts_delete(&db, DEFAULT_USER, id);
    assert!(result.is_err());
    assert_eq!(db.count_receipts("other@chit.dev").unwrap(), 1);
}

// ========== Audit Command ==========

#[test]
fn test_cmd_audit() {
    let db = setup_test_db();
    db.log_audit(DEFAULT_USER, "receipt_upload", Some("receipt.jpg"))
        .unwrap();
    db.log_audit(DEFAULT_USER, "ask_query", None).unwrap();

    let result = commands::cmd_audit(&db, 20);
    assert!(result.is_ok());
}

#[test]
fn test_cmd_audit_empty() {
    let db = setup_test_db();
    let result = commands::cmd_audit(&db, 20);
    assert!(result.is_ok());
}
