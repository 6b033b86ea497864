//! Chat route.

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::auth::Principal;
use crate::api::server::AppState;
use crate::chat::{ChatRequest, ChatResponse};
use crate::error::Result;

/// POST /api/v1/chat — answer a prompt, from the cache when possible.
pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let response = state.chat.chat(&principal, request).await?;
    Ok(Json(response))
}
