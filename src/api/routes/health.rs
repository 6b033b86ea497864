//! Health endpoint for the portal API.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::server::AppState;

/// GET /health — liveness and readiness, no auth required.
///
/// `ready` turns true once the listener is bound and false again on shutdown.
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "ready": state.metrics.is_ready(),
    }))
}
