//! Test support: a local mock model server
//!
//! Serves just enough of the Messages protocol for agent tests: queued
//! responses come back one per request, and the tags endpoint reports a
//! single model so health checks pass.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::oneshot;

type ResponseQueue = Arc<Mutex<VecDeque<Value>>>;

/// A mock Anthropic-compatible server bound to an ephemeral local port
pub struct MockModelServer {
    addr: std::net::SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockModelServer {
    /// Start the server with a queue of canned Messages responses
    pub async fn start(responses: Vec<Value>) -> Self {
        let queue: ResponseQueue = Arc::new(Mutex::new(responses.into()));

        let app = Router::new()
            .route("/v1/messages", post(messages))
            .route("/api/tags", get(tags))
            .with_state(queue);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                })
                .await
                .ok();
        });

        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockModelServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
    }
}

async fn messages(State(queue): State<ResponseQueue>) -> impl IntoResponse {
    let next = queue.lock().expect("queue lock").pop_front();
    match next {
        Some(response) => (StatusCode::OK, Json(response)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "mock response queue exhausted"})),
        ),
    }
}

async fn tags() -> Json<Value> {
    Json(serde_json::json!({"models": [{"name": "llama3.2"}]}))
}
