//! Receipt upload and management handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use chit_core::models::{ProcessedReceipt, ReceiptRecord};
use chit_core::Error as CoreError;

use crate::{get_user_email, AppError, AppState, SuccessResponse, MAX_PAGE_LIMIT, MAX_UPLOAD_SIZE};

/// Header carrying the original filename of an upload
const FILENAME_HEADER: &str = "x-filename";

const DEFAULT_FILENAME: &str = "receipt.jpg";
const DEFAULT_PAGE_LIMIT: i64 = 50;

#[derive(Serialize)]
pub struct UploadResponse {
    pub receipts: Vec<ProcessedReceipt>,
    /// User-facing note (empty scan, processing error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/receipts - process a raw image body through the pipeline
pub async fn upload_receipt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let Some(pipeline) = &state.pipeline else {
        return Err(AppError::unavailable(
            "Receipt processing is not configured on this server",
        ));
    };

    if body.is_empty() {
        return Err(AppError::bad_request("Upload body is empty"));
    }
    if body.len() > MAX_UPLOAD_SIZE {
        return Err(AppError::payload_too_large("Upload exceeds the 10 MB limit"));
    }

    let filename = headers
        .get(FILENAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FILENAME)
        .to_string();
    let user = get_user_email(&headers);

    let (receipts, message) = pipeline.process(&body, &filename, &user).await;
    state.db.log_audit(&user, "receipt_upload", Some(&filename))?;

    Ok(Json(UploadResponse { receipts, message }))
}

#[derive(Deserialize)]
pub struct ListReceiptsParams {
    pub limit: Option<i64>,
}

/// GET /api/receipts - newest receipts for the current user
pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListReceiptsParams>,
) -> Result<Json<Vec<ReceiptRecord>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let user = get_user_email(&headers);
    Ok(Json(state.db.list_receipts(&user, limit)?))
}

/// GET /api/receipts/:id
pub async fn get_receipt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ReceiptRecord>, AppError> {
    let user = get_user_email(&headers);
    match state.db.get_receipt(&user, id) {
        Ok(receipt) => Ok(Json(receipt)),
        Err(CoreError::NotFound(_)) => Err(AppError::not_found("Receipt not found")),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /api/receipts/:id
pub async fn delete_receipt(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = get_user_email(&headers);
    if !state.db.delete_receipt(&user, id)? {
        return Err(AppError::not_found("Receipt not found"));
    }
    state
        .db
        .log_audit(&user, "receipt_delete", Some(&id.to_string()))?;
    Ok(Json(SuccessResponse { success: true }))
}
