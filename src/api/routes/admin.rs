//! Admin routes: metrics and cache administration.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::api::auth::Principal;
use crate::api::server::AppState;
use crate::error::Result;
use crate::health::get_rss_bytes;

/// GET /admin/metrics — portal counters and cache statistics.
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>> {
    principal.require_admin()?;
    let cache = state.cache.stats();
    let metrics = &state.metrics;
    Ok(Json(json!({
        "total_sessions": state.sessions.session_count().await,
        "total_messages": state.sessions.message_count().await,
        "cache_size": cache.entries,
        "cache_capacity": cache.capacity,
        "cache_hits": cache.hits,
        "cache_misses": cache.misses,
        "cache_evictions": cache.evictions,
        "requests": metrics.requests.load(Ordering::Relaxed),
        "errors": metrics.errors.load(Ordering::Relaxed),
        "uptime_secs": metrics.uptime().as_secs(),
        "memory_mb": get_rss_bytes().map(|b| b / (1024 * 1024)),
    })))
}

/// POST /admin/cache/clear — drop every cached response.
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Value>> {
    principal.require_admin()?;
    let dropped = state.cache.clear();
    info!(admin = %principal.username, dropped, "Response cache cleared");
    Ok(Json(json!({ "status": "cleared", "dropped": dropped })))
}
