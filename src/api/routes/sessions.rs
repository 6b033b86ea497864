//! Session history routes.
//!
//! Users only ever see their own sessions; another user's id is reported as
//! not found.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::auth::Principal;
use crate::api::server::AppState;
use crate::error::Result;
use crate::session::{MessageRole, SessionSummary};

/// Full session view returned by `GET /api/v1/sessions/{id}`.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    id: u64,
    title: String,
    created_at: String,
    messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
struct MessageView {
    role: MessageRole,
    content: String,
}

/// GET /api/v1/sessions — the caller's sessions, oldest first.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.list_for_user(&principal.username).await)
}

/// GET /api/v1/sessions/{id} — one session with its messages.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<u64>,
) -> Result<Json<SessionDetail>> {
    let session = state.sessions.get_for_user(id, &principal.username).await?;
    Ok(Json(SessionDetail {
        id: session.id,
        title: session.title,
        created_at: session.created_at.to_rfc3339(),
        messages: session
            .messages
            .into_iter()
            .map(|m| MessageView {
                role: m.role,
                content: m.content,
            })
            .collect(),
    }))
}
