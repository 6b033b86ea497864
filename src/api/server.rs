//! Axum API server for the PocketLLM portal.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware as axum_mw;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::auth::TokenTable;
use crate::api::config::ServerConfig;
use crate::cache::ResponseCache;
use crate::chat::ChatService;
use crate::config::Config;
use crate::error::{PortalError, Result};
use crate::health::UsageMetrics;
use crate::inference::InferenceBackend;
use crate::session::SessionStore;

/// Shared state for all API handlers.
///
/// Built once by the composition root; every field is an `Arc`, so cloning
/// the state per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Static bearer tokens accepted by the auth middleware.
    pub tokens: Arc<TokenTable>,
    /// Process-wide response cache (also reachable through `chat`).
    pub cache: Arc<ResponseCache>,
    /// Per-user chat sessions.
    pub sessions: Arc<SessionStore>,
    /// Lock-free request counters.
    pub metrics: Arc<UsageMetrics>,
    /// Cache-fronted chat handler.
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Wire up the portal's components from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Config`] if the cache capacity is invalid.
    pub fn new(config: &Config, backend: Arc<dyn InferenceBackend>) -> Result<Self> {
        let cache = Arc::new(ResponseCache::new(config.cache.capacity)?);
        let sessions = Arc::new(SessionStore::new());
        let metrics = Arc::new(UsageMetrics::new());
        let chat = Arc::new(ChatService::new(
            cache.clone(),
            backend,
            sessions.clone(),
            metrics.clone(),
            config.inference.clone(),
        ));
        Ok(Self {
            tokens: Arc::new(TokenTable::from_config(&config.auth)),
            cache,
            sessions,
            metrics,
            chat,
        })
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = match &self {
            PortalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PortalError::Inference(_) => StatusCode::BAD_GATEWAY,
            PortalError::Config(_) | PortalError::Io(_) | PortalError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the axum router with all API routes.
///
/// # Errors
///
/// Returns [`PortalError::Config`] if the CORS origin is not a valid header
/// value.
pub fn build_router(state: AppState, server: &ServerConfig) -> Result<Router> {
    let shared_state = Arc::new(state);

    // CORS: only allow requests from the frontend origin.
    let origin = server.cors_origin.parse::<HeaderValue>().map_err(|_| {
        PortalError::Config(format!("invalid CORS origin {:?}", server.cors_origin))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
        ]);

    let router = Router::new()
        .route("/health", get(super::routes::health::get_health))
        // Chat
        .route("/api/v1/chat", post(super::routes::chat::post_chat))
        // Sessions
        .route(
            "/api/v1/sessions",
            get(super::routes::sessions::list_sessions),
        )
        .route(
            "/api/v1/sessions/{id}",
            get(super::routes::sessions::get_session),
        )
        // Admin
        .route("/admin/metrics", get(super::routes::admin::get_metrics))
        .route("/admin/cache/clear", post(super::routes::admin::clear_cache))
        .layer(axum_mw::from_fn_with_state(
            shared_state.clone(),
            super::middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    Ok(router)
}

/// Start the API server and serve until Ctrl-C.
pub async fn start_server(
    server: &ServerConfig,
    state: AppState,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics = state.metrics.clone();
    let app = build_router(state, server)?;
    let addr = server.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Portal API server listening on {addr}");
    metrics.set_ready(true);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    metrics.set_ready(false);
    metrics.emit_usage("shutdown");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
