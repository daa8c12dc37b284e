//! Per-user pipeline session memory
//!
//! Tracks which stage a user's upload is in and remembers summaries of
//! recently processed receipts so the API can answer "what just happened"
//! without a database round trip. Sessions live in memory behind an async
//! RwLock and expire after 30 minutes of inactivity.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::ReceiptSummary;

/// Session timeout (30 minutes of inactivity)
const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Stage of the upload pipeline a user's request is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Uploading,
    Ocr,
    Categorization,
}

#[derive(Debug)]
struct UserSession {
    last_activity: Instant,
    pending_stage: Option<PipelineStage>,
    last_receipt: Option<ReceiptSummary>,
    receipts: HashMap<String, ReceiptSummary>,
}

impl UserSession {
    fn new() -> Self {
        Self {
            last_activity: Instant::now(),
            pending_stage: None,
            last_receipt: None,
            receipts: HashMap::new(),
        }
    }

    fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > SESSION_TIMEOUT
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Serializable view of a user's session state
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub pending_stage: Option<PipelineStage>,
    pub last_receipt: Option<ReceiptSummary>,
    pub receipt_count: usize,
}

/// In-memory registry of per-user pipeline sessions
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: RwLock<HashMap<String, UserSession>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Mark the stage the user's pipeline run is currently in
    pub async fn set_stage(&self, user_email: &str, stage: PipelineStage) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired());
        let session = sessions
            .entry(user_email.to_string())
            .or_insert_with(UserSession::new);
        session.pending_stage = Some(stage);
        session.touch();
    }

    /// Clear the pending stage once a run finishes (success or failure)
    pub async fn clear_stage(&self, user_email: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(user_email) {
            session.pending_stage = None;
            session.touch();
        }
    }

    /// Remember a processed receipt for the user
    pub async fn remember_receipt(&self, user_email: &str, summary: ReceiptSummary) {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(user_email.to_string())
            .or_insert_with(UserSession::new);
        session.receipts.insert(summary.key(), summary.clone());
        session.last_receipt = Some(summary);
        session.touch();
    }

    /// Current state for a user (None if never seen or expired)
    pub async fn snapshot(&self, user_email: &str) -> Option<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        sessions
            .get(user_email)
            .filter(|s| !s.is_expired())
            .map(|s| SessionSnapshot {
                pending_stage: s.pending_stage,
                last_receipt: s.last_receipt.clone(),
                receipt_count: s.receipts.len(),
            })
    }
}
