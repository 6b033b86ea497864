//! API authentication middleware.
//!
//! Checks `Authorization: Bearer <token>` on every request except the
//! health check, and attaches the resolved [`Principal`] as a request
//! extension for handlers to extract.

use std::sync::Arc;

use axum::{extract::State, http::Request, middleware::Next, response::Response};

use super::auth::Principal;
use super::server::AppState;
use crate::error::PortalError;

/// Paths reachable without a token.
const PUBLIC_PATHS: &[&str] = &["/health"];

/// Middleware that resolves the bearer token into a [`Principal`].
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, PortalError> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PortalError::Unauthorized("missing Authorization header".to_string()))?;

    let principal: Principal = state.tokens.verify_bearer(header)?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

// ============================================================================
// Tests
// ============================================================================
