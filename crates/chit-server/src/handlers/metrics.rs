//! Pipeline metrics and session-state handlers

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use chit_core::metrics::MetricsSnapshot;
use chit_core::session::SessionSnapshot;

use crate::{get_user_email, AppState};

/// GET /api/metrics - aggregated pipeline counters
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[derive(Serialize)]
pub struct PipelineSessionResponse {
    #[serde(flatten)]
    pub session: Option<SessionSnapshot>,
    pub active: bool,
}

/// GET /api/pipeline/session - the caller's pipeline session state
pub async fn get_pipeline_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<PipelineSessionResponse> {
    let user = get_user_email(&headers);
    let session = state.sessions.snapshot(&user).await;
    Json(PipelineSessionResponse {
        active: session.is_some(),
        session,
    })
}
