//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chit_core::db::Database;
use chit_core::test_utils::MockModelServer;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

fn test_components(db: &Database, dir: &std::path::Path, agent_url: &str) -> AppComponents {
    let metrics = Arc::new(PipelineMetrics::new());
    let sessions = Arc::new(SessionTracker::new());
    let pipeline = ReceiptPipeline::new(
        OcrClient::mock(),
        LlmClient::mock(),
        db.clone(),
        ReceiptStore::new(dir).unwrap(),
        metrics.clone(),
        sessions.clone(),
    );
    AppComponents {
        pipeline: Some(pipeline),
        agent: ExpenseAgent::new(
            AnthropicCompatBackend::new(agent_url, "llama3.2"),
            db.clone(),
        ),
        metrics,
        sessions,
    }
}

fn setup_app_with_config(config: ServerConfig, agent_url: &str) -> (Router, TempDir) {
    let tmp = TempDir::new().unwrap();
    let db = Database::in_memory().unwrap();
    let components = test_components(&db, tmp.path(), agent_url);
    let app = create_router_with_components(db, None, config, tmp.path(), components);
    (app, tmp)
}

fn setup_test_app() -> (Router, TempDir) {
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    // Unroutable agent host; agent failures degrade to the fallback answer
    setup_app_with_config(config, "http://127.0.0.1:1")
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn upload(app: &Router, filename: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/receipts")
                .header("x-filename", filename)
                .body(Body::from("fake image bytes"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await
}

// ========== Auth Tests ==========

#[tokio::test]
async fn test_unauthorized_without_credentials() {
    let config = ServerConfig {
        require_auth: true,
        api_keys: vec!["sekret".to_string()],
        ..Default::default()
    };
    let (app, _tmp) = setup_app_with_config(config, "http://127.0.0.1:1");

    let response = app.oneshot(get("/api/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_key_auth() {
    let config = ServerConfig {
        require_auth: true,
        api_keys: vec!["sekret".to_string()],
        ..Default::default()
    };
    let (app, _tmp) = setup_app_with_config(config, "http://127.0.0.1:1");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/metrics")
                .header("authorization", "Bearer sekret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/metrics")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_proxy_header_auth() {
    let config = ServerConfig {
        require_auth: true,
        ..Default::default()
    };
    let (app, _tmp) = setup_app_with_config(config, "http://127.0.0.1:1");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header("x-auth-request-email", "user@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["email"], "user@example.com");
}

#[tokio::test]
async fn test_health_reachable_without_auth() {
    let config = ServerConfig {
        require_auth: true,
        ..Default::default()
    };
    let (app, _tmp) = setup_app_with_config(config, "http://127.0.0.1:1");

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["uploads_enabled"], true);
}

#[tokio::test]
async fn test_me_defaults_to_local_user() {
    let (app, _tmp) = setup_test_app();

    let response = app.oneshot(get("/api/me")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["email"], "local@chit.dev");
}

// ========== Receipt API Tests ==========

#[tokio::test]
async fn test_upload_and_list_receipts() {
    let (app, _tmp) = setup_test_app();

    let json = upload(&app, "deli.jpg").await;
    let receipts = json["receipts"].as_array().unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0]["merchant"], "Corner Deli");
    assert_eq!(receipts[0]["category"], "Food & Beverage");
    assert!(json.get("message").is_none());

    let response = app.oneshot(get("/api/receipts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = get_body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_rejects_empty_body() {
    let (app, _tmp) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/receipts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_and_delete_receipt() {
    let (app, _tmp) = setup_test_app();

    let json = upload(&app, "deli.jpg").await;
    let id = json["receipts"][0]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/receipts/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = get_body_json(response).await;
    assert_eq!(fetched["merchant"], "Corner Deli");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/receipts/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/receipts/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_receipts_scoped_by_user() {
    let (app, _tmp) = setup_test_app();

    upload(&app, "deli.jpg").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/receipts")
                .header("x-auth-request-email", "other@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_receipt_is_404() {
    let (app, _tmp) = setup_test_app();
    let response = app.oneshot(get("/api/receipts/9999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ========== Metrics and Session Tests ==========

#[tokio::test]
async fn test_metrics_after_upload() {
    let (app, _tmp) = setup_test_app();

    upload(&app, "deli.jpg").await;

    let response = app.oneshot(get("/api/metrics")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["receipts_processed"], 1);
    assert_eq!(json["runs"], 1);
}

#[tokio::test]
async fn test_pipeline_session_after_upload() {
    let (app, _tmp) = setup_test_app();

    let response = app.clone().oneshot(get("/api/pipeline/session")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["active"], false);

    upload(&app, "deli.jpg").await;

    let response = app.oneshot(get("/api/pipeline/session")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["active"], true);
    assert_eq!(json["receipt_count"], 1);
    assert_eq!(json["last_receipt"]["merchant"], "Corner Deli");
}

// ========== Report Tests ==========

#[tokio::test]
async fn test_category_report() {
    let (app, _tmp) = setup_test_app();

    upload(&app, "deli.jpg").await;

    let response = app.oneshot(get("/api/reports/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["category"], "Food & Beverage");
}

#[tokio::test]
async fn test_merchant_report() {
    let (app, _tmp) = setup_test_app();

    upload(&app, "deli.jpg").await;
    upload(&app, "deli2.jpg").await;

    let response = app.oneshot(get("/api/reports/merchants")).await.unwrap();
    let json = get_body_json(response).await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["merchant"], "Corner Deli");
    assert_eq!(rows[0]["visit_count"], 2);
}

#[tokio::test]
async fn test_summary_rejects_bad_month() {
    let (app, _tmp) = setup_test_app();

    let response = app
        .oneshot(get("/api/reports/summary?year=2024&month=13"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Ask Tests ==========

fn text_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "model": "llama3.2",
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {"input_tokens": 1, "output_tokens": 1}
    })
}

async fn ask(app: &Router, body: serde_json::Value) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ask")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ask_returns_model_answer() {
    let server = MockModelServer::start(vec![text_response("You spent nothing.")]).await;
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let (app, _tmp) = setup_app_with_config(config, &server.url());

    let response = ask(&app, serde_json::json!({"question": "What did I spend?"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["answer"], "You spent nothing.");
    assert_eq!(json["iterations"], 1);
}

#[tokio::test]
async fn test_ask_rejects_empty_question() {
    let (app, _tmp) = setup_test_app();
    let response = ask(&app, serde_json::json!({"question": "   "})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ask_falls_back_when_model_unreachable() {
    let (app, _tmp) = setup_test_app();

    let response = ask(&app, serde_json::json!({"question": "Anything?"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["answer"].as_str().unwrap().starts_with("Sorry,"));
    assert_eq!(json["iterations"], 0);
}

#[tokio::test]
async fn test_ask_session_lifecycle() {
    let server = MockModelServer::start(vec![text_response("Answer one.")]).await;
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let (app, _tmp) = setup_app_with_config(config, &server.url());

    // Create
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ask/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = get_body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(session_id.starts_with("ask_"));

    // Ask within the session
    let response = ask(
        &app,
        serde_json::json!({"question": "Q1", "session_id": session_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Session now holds the question and the answer
    let response = app
        .clone()
        .oneshot(get(&format!("/api/ask/session/{}", session_id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["message_count"], 2);

    // Delete, then it is gone
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/ask/session/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/ask/session/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ask_unknown_session_is_404() {
    let (app, _tmp) = setup_test_app();
    let response = ask(
        &app,
        serde_json::json!({"question": "Q", "session_id": "ask_nope"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ask_session_scoped_to_user() {
    let (app, _tmp) = setup_test_app();

    // Created by one user
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ask/session")
                .header("x-auth-request-email", "a@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let session_id = get_body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Invisible to another
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/ask/session/{}", session_id))
                .header("x-auth-request-email", "b@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
