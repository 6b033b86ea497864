//! In-memory chat session store.
//!
//! Sessions belong to one username. Lookups by another user behave exactly
//! like a missing session, so ids never leak across users. Nothing is
//! persisted; a restart starts empty.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{PortalError, Result};

/// Maximum characters of the first prompt used as a session title.
pub const TITLE_MAX_CHARS: usize = 50;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: u64,
    pub owner: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// Compact view returned by [`SessionStore::list_for_user`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: u64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    sessions: BTreeMap<u64, Session>,
    message_count: usize,
}

/// Thread-safe session registry.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session for `owner`, titled after `first_prompt`.
    pub async fn create(&self, owner: &str, first_prompt: &str) -> u64 {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.sessions.insert(
            id,
            Session {
                id,
                owner: owner.to_string(),
                title: first_prompt.chars().take(TITLE_MAX_CHARS).collect(),
                created_at: Utc::now(),
                messages: Vec::new(),
            },
        );
        id
    }

    /// Fetch a session owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::NotFound`] when the id is unknown or owned by
    /// someone else.
    pub async fn get_for_user(&self, id: u64, owner: &str) -> Result<Session> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(&id)
            .filter(|s| s.owner == owner)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Sessions owned by `owner`, oldest first.
    pub async fn list_for_user(&self, owner: &str) -> Vec<SessionSummary> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .values()
            .filter(|s| s.owner == owner)
            .map(|s| SessionSummary {
                id: s.id,
                title: s.title.clone(),
                created_at: s.created_at,
            })
            .collect()
    }

    /// Append a prompt and its reply to a session owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::NotFound`] under the same rules as
    /// [`Self::get_for_user`].
    pub async fn append_exchange(
        &self,
        id: u64,
        owner: &str,
        prompt: &str,
        response: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(&id)
            .filter(|s| s.owner == owner)
            .ok_or_else(|| not_found(id))?;
        let now = Utc::now();
        session.messages.push(Message {
            role: MessageRole::User,
            content: prompt.to_string(),
            created_at: now,
        });
        session.messages.push(Message {
            role: MessageRole::Assistant,
            content: response.to_string(),
            created_at: now,
        });
        inner.message_count += 2;
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn message_count(&self) -> usize {
        self.inner.read().await.message_count
    }
}

fn not_found(id: u64) -> PortalError {
    PortalError::NotFound(format!("session {id}"))
}
