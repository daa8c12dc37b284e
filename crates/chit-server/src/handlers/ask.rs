//! Conversational agent handlers with session support
//!
//! Sessions keep multi-turn context in memory only. They are scoped to
//! the creating user, expire after 30 minutes of inactivity, and hold a
//! bounded window of recent messages.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::warn;

use chit_core::ai::agent::FALLBACK_ANSWER;
use chit_core::ai::anthropic_compat::Message;
use chit_core::ai::ToolCallRecord;

use crate::{get_user_email, AppError, AppState, SuccessResponse};

/// Session timeout (30 minutes of inactivity)
const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Maximum messages retained per session
const MAX_HISTORY_MESSAGES: usize = 20;

struct AskSession {
    user_email: String,
    messages: Vec<Message>,
    last_activity: Instant,
}

impl AskSession {
    fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > SESSION_TIMEOUT
    }
}

/// In-memory conversation sessions for the ask endpoint
#[derive(Default)]
pub struct AskSessionManager {
    sessions: RwLock<HashMap<String, AskSession>>,
}

impl AskSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a user and return its id
    pub async fn create_session(&self, user_email: &str) -> String {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired());

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let digest = Sha256::digest(nanos.to_le_bytes());
        let id = format!("ask_{}", &hex::encode(digest)[..16]);

        sessions.insert(
            id.clone(),
            AskSession {
                user_email: user_email.to_string(),
                messages: Vec::new(),
                last_activity: Instant::now(),
            },
        );
        id
    }

    /// Stored history for a live session owned by this user
    pub async fn get_messages(&self, id: &str, user_email: &str) -> Option<Vec<Message>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .filter(|s| !s.is_expired() && s.user_email == user_email)?;
        session.last_activity = Instant::now();
        Some(session.messages.clone())
    }

    /// Replace a session's history, keeping only the most recent window
    pub async fn update_session(&self, id: &str, user_email: &str, messages: Vec<Message>) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions
            .get_mut(id)
            .filter(|s| s.user_email == user_email)
        {
            let skip = messages.len().saturating_sub(MAX_HISTORY_MESSAGES);
            session.messages = messages.into_iter().skip(skip).collect();
            session.last_activity = Instant::now();
        }
    }

    pub async fn delete_session(&self, id: &str, user_email: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(session) if session.user_email == user_email => {
                sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    pub async fn session_info(&self, id: &str, user_email: &str) -> Option<AskSessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .filter(|s| !s.is_expired() && s.user_email == user_email)
            .map(|s| AskSessionInfo {
                session_id: id.to_string(),
                message_count: s.messages.len(),
            })
    }
}

#[derive(Serialize)]
pub struct AskSessionInfo {
    pub session_id: String,
    pub message_count: usize,
}

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
    /// Continue an existing conversation
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub iterations: usize,
}

/// POST /api/ask - ask the agent a question about stored receipts
pub async fn query_ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::bad_request("Question cannot be empty"));
    }

    let user = get_user_email(&headers);

    let history = match &request.session_id {
        Some(id) => state
            .ask_sessions
            .get_messages(id, &user)
            .await
            .ok_or_else(|| AppError::not_found("Session not found or expired"))?,
        None => Vec::new(),
    };

    state.db.log_audit(&user, "ask_query", None)?;

    match state.agent.answer(question, &user, history).await {
        Ok(result) => {
            if let Some(id) = &request.session_id {
                state
                    .ask_sessions
                    .update_session(id, &user, result.messages)
                    .await;
            }
            Ok(Json(AskResponse {
                answer: result.response,
                session_id: request.session_id,
                tool_calls: result.tool_calls,
                iterations: result.iterations,
            }))
        }
        Err(e) => {
            // Model failures degrade to the fallback answer; the session
            // history is left as it was.
            warn!(error = %e, "Agent query failed");
            Ok(Json(AskResponse {
                answer: FALLBACK_ANSWER.to_string(),
                session_id: request.session_id,
                tool_calls: Vec::new(),
                iterations: 0,
            }))
        }
    }
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// POST /api/ask/session - start a conversation session
pub async fn create_ask_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<CreateSessionResponse> {
    let user = get_user_email(&headers);
    let session_id = state.ask_sessions.create_session(&user).await;
    Json(CreateSessionResponse { session_id })
}

/// GET /api/ask/session/:id
pub async fn get_ask_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AskSessionInfo>, AppError> {
    let user = get_user_email(&headers);
    state
        .ask_sessions
        .session_info(&id, &user)
        .await
        .map(Json)
        .ok_or_else(|| AppError::not_found("Session not found or expired"))
}

/// DELETE /api/ask/session/:id
pub async fn delete_ask_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = get_user_email(&headers);
    if !state.ask_sessions.delete_session(&id, &user).await {
        return Err(AppError::not_found("Session not found"));
    }
    Ok(Json(SuccessResponse { success: true }))
}
