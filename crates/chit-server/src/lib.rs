//! Chit Web Server
//!
//! Axum-based REST API for the Chit receipt tracker.
//!
//! Security posture:
//! - Authentication required by default (use --no-auth for local dev)
//! - User identity comes from the auth proxy header or API keys
//! - Restrictive CORS policy and standard security headers
//! - Upload size limits and sanitized error responses
//! - Audit logging for uploads, deletions, and agent queries

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use chit_core::ai::{AnthropicCompatBackend, ExpenseAgent, LlmBackend, LlmClient};
use chit_core::db::Database;
use chit_core::metrics::PipelineMetrics;
use chit_core::ocr::{OcrBackend, OcrClient};
use chit_core::pipeline::ReceiptPipeline;
use chit_core::session::SessionTracker;
use chit_core::store::ReceiptStore;

mod handlers;

/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Header set by the auth proxy with the authenticated user's email
const AUTH_USER_HEADER: &str = "x-auth-request-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// User identity recorded when no authenticated email is available
const LOCAL_USER: &str = "local@chit.dev";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys for internal service authentication
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Upload pipeline (absent when no OCR backend is configured)
    pub pipeline: Option<ReceiptPipeline>,
    /// Conversational agent over the spending tools
    pub agent: ExpenseAgent,
    pub metrics: Arc<PipelineMetrics>,
    /// Per-user pipeline stage and recent-receipt memory
    pub sessions: Arc<SessionTracker>,
    /// Conversation sessions for the ask endpoint
    pub ask_sessions: handlers::AskSessionManager,
}

/// Authentication middleware - validates the proxy email header or API keys
///
/// # Security Notes
///
/// **Proxy header**: The `x-auth-request-email` header is trusted as set by
/// the fronting auth proxy. It is only safe when the server is not exposed
/// directly; the proxy must strip client-supplied copies of the header.
///
/// **API keys**: Compared using constant-time comparison to prevent timing
/// attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    // Health probes stay reachable without credentials
    if request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    let proxy_user = request
        .headers()
        .get(AUTH_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(email) = proxy_user {
        info!(user = %email, path = %request.uri().path(), "Authenticated via proxy header");
        return next.run(request).await;
    }

    // Check for API key in Authorization header (Bearer token)
    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time
/// comparison to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && provided_bytes.ct_eq(key_bytes).into() {
            return true;
        }
    }
    false
}

/// Extract the user email a request acts on behalf of
///
/// Falls back to a fixed local identity so single-user deployments work
/// without any auth proxy.
pub fn get_user_email(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(AUTH_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| LOCAL_USER.to_string())
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Pre-built pipeline components, injectable for tests
pub struct AppComponents {
    pub pipeline: Option<ReceiptPipeline>,
    pub agent: ExpenseAgent,
    pub metrics: Arc<PipelineMetrics>,
    pub sessions: Arc<SessionTracker>,
}

impl AppComponents {
    /// Build components from the environment
    pub fn from_env(db: Database, receipts_dir: &std::path::Path) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let sessions = Arc::new(SessionTracker::new());

        let llm = LlmClient::from_env();
        info!(host = %llm.host(), model = %llm.model(), "LLM backend configured");

        let ocr = OcrClient::from_env();
        match &ocr {
            Some(client) => info!(backend = %client.describe(), "OCR backend configured"),
            None => info!("OCR backend not configured (set AZURE_DI_ENDPOINT and AZURE_DI_KEY to enable uploads)"),
        }

        let store = match ReceiptStore::new(receipts_dir) {
            Ok(store) => Some(store),
            Err(e) => {
                error!(error = %e, dir = %receipts_dir.display(), "Cannot open receipt store");
                None
            }
        };

        let pipeline = match (ocr, store) {
            (Some(ocr), Some(store)) => Some(ReceiptPipeline::new(
                ocr,
                llm,
                db.clone(),
                store,
                metrics.clone(),
                sessions.clone(),
            )),
            _ => None,
        };

        let backend = AnthropicCompatBackend::from_env();
        info!(host = %backend.host(), model = %backend.model(), "Agent backend configured");
        let agent = ExpenseAgent::new(backend, db);

        Self {
            pipeline,
            agent,
            metrics,
            sessions,
        }
    }
}

/// Directory receipt images are stored in and served from
pub fn receipts_dir_from_env() -> PathBuf {
    std::env::var("CHIT_RECEIPTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("receipts"))
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let receipts_dir = receipts_dir_from_env();
    let components = AppComponents::from_env(db.clone(), &receipts_dir);
    create_router_with_components(db, static_dir, config, &receipts_dir, components)
}

/// Create the application router with injected components (for testing)
pub fn create_router_with_components(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    receipts_dir: &std::path::Path,
    components: AppComponents,
) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        pipeline: components.pipeline,
        agent: components.agent,
        metrics: components.metrics,
        sessions: components.sessions,
        ask_sessions: handlers::AskSessionManager::new(),
    });

    let api_routes = Router::new()
        // Auth and health
        .route("/me", get(handlers::get_me))
        .route("/health", get(handlers::get_health))
        // Receipts
        .route(
            "/receipts",
            get(handlers::list_receipts).post(handlers::upload_receipt),
        )
        .route(
            "/receipts/:id",
            get(handlers::get_receipt).delete(handlers::delete_receipt),
        )
        // Conversational agent
        .route("/ask", post(handlers::query_ask))
        .route("/ask/session", post(handlers::create_ask_session))
        .route(
            "/ask/session/:id",
            get(handlers::get_ask_session).delete(handlers::delete_ask_session),
        )
        // Pipeline session memory
        .route("/pipeline/session", get(handlers::get_pipeline_session))
        // Metrics
        .route("/metrics", get(handlers::get_metrics))
        // Reports
        .route("/reports/categories", get(handlers::report_categories))
        .route("/reports/merchants", get(handlers::report_merchants))
        .route("/reports/summary", get(handlers::report_summary));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // Security headers
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' blob: data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        // Uploaded images serve from the same origin, behind auth
        .nest_service("/receipts", ServeDir::new(receipts_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled - do not expose to network!");
    }

    check_backend_connections().await;

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log backend connection status at startup
async fn check_backend_connections() {
    let llm = LlmClient::from_env();
    if llm.health_check().await {
        info!(host = %llm.host(), model = %llm.model(), "LLM backend connected");
    } else {
        warn!(host = %llm.host(), "LLM backend configured but not responding");
    }

    match OcrClient::from_env() {
        Some(ocr) => {
            if ocr.health_check().await {
                info!(backend = %ocr.describe(), "OCR backend connected");
            } else {
                warn!(backend = %ocr.describe(), "OCR backend configured but not responding");
            }
        }
        None => info!("OCR backend not configured (uploads disabled)"),
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn payload_too_large(msg: &str) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
