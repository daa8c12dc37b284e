//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::AppState;

pub mod ask;
pub mod metrics;
pub mod receipts;
pub mod reports;

// Re-export all handlers for use in router
pub use ask::*;
pub use metrics::*;
pub use receipts::*;
pub use reports::*;

/// Current user info
#[derive(Serialize)]
pub struct MeResponse {
    pub email: String,
}

/// GET /api/me - who the request is acting as
pub async fn get_me(headers: HeaderMap) -> Json<MeResponse> {
    Json(MeResponse {
        email: crate::get_user_email(&headers),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Whether the upload pipeline is configured
    pub uploads_enabled: bool,
}

/// GET /api/health - liveness probe (reachable without auth)
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uploads_enabled: state.pipeline.is_some(),
    })
}
