//! Chat request handling.
//!
//! [`ChatService`] memoizes inference through the shared [`ResponseCache`]:
//! a hit skips the backend entirely, a miss calls it and stores the result
//! only when generation succeeded. Every answered prompt is recorded in the
//! caller's session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::auth::Principal;
use crate::cache::ResponseCache;
use crate::config::InferenceConfig;
use crate::error::{PortalError, Result};
use crate::health::UsageMetrics;
use crate::inference::InferenceBackend;
use crate::session::SessionStore;

/// Body of `POST /api/v1/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub session_id: Option<u64>,
}

/// Reply to a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// `true` when the response came from the cache.
    pub cached: bool,
    pub session_id: u64,
}

/// Cache-fronted chat handler shared by all requests.
pub struct ChatService {
    cache: Arc<ResponseCache>,
    backend: Arc<dyn InferenceBackend>,
    sessions: Arc<SessionStore>,
    metrics: Arc<UsageMetrics>,
    limits: InferenceConfig,
}

impl ChatService {
    pub fn new(
        cache: Arc<ResponseCache>,
        backend: Arc<dyn InferenceBackend>,
        sessions: Arc<SessionStore>,
        metrics: Arc<UsageMetrics>,
        limits: InferenceConfig,
    ) -> Self {
        Self {
            cache,
            backend,
            sessions,
            metrics,
            limits,
        }
    }

    /// Answer `request` on behalf of `principal`.
    pub async fn chat(&self, principal: &Principal, request: ChatRequest) -> Result<ChatResponse> {
        self.metrics.record_request();
        let result = self.answer(principal, request).await;
        if let Err(e) = &result {
            self.metrics.record_error();
            warn!(user = %principal.username, "Chat request failed: {}", e);
        }
        result
    }

    async fn answer(&self, principal: &Principal, request: ChatRequest) -> Result<ChatResponse> {
        let max_tokens = self.validate(&request)?;

        // Resolve the session before inference so a bad id never costs a
        // generation or populates the cache.
        if let Some(id) = request.session_id {
            self.sessions.get_for_user(id, &principal.username).await?;
        }

        let key = ResponseCache::fingerprint(&request.prompt, max_tokens);
        let (response, cached) = match self.cache.get(&key) {
            Some(hit) => {
                self.metrics.record_cached_response();
                (hit, true)
            }
            None => {
                let fresh = self.backend.generate(&request.prompt, max_tokens).await?;
                self.cache.set(key, fresh.clone());
                (fresh, false)
            }
        };

        let session_id = match request.session_id {
            Some(id) => id,
            None => {
                self.sessions
                    .create(&principal.username, &request.prompt)
                    .await
            }
        };
        self.sessions
            .append_exchange(session_id, &principal.username, &request.prompt, &response)
            .await?;

        debug!(user = %principal.username, session_id, cached, "Chat answered");
        Ok(ChatResponse {
            response,
            cached,
            session_id,
        })
    }

    fn validate(&self, request: &ChatRequest) -> Result<u32> {
        if request.prompt.trim().is_empty() {
            return Err(PortalError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        let max_tokens = request
            .max_tokens
            .unwrap_or(self.limits.default_max_tokens);
        if max_tokens == 0 || max_tokens > self.limits.max_tokens_limit {
            return Err(PortalError::InvalidRequest(format!(
                "max_tokens must be between 1 and {}",
                self.limits.max_tokens_limit
            )));
        }
        Ok(max_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::Role;
    use crate::inference::{FallbackBackend, MockInferenceBackend};
    use std::sync::atomic::Ordering;

    fn alice() -> Principal {
        Principal {
            username: "alice".into(),
            role: Role::User,
        }
    }

    fn bob() -> Principal {
        Principal {
            username: "bob".into(),
            role: Role::User,
        }
    }

    struct Harness {
        service: ChatService,
        cache: Arc<ResponseCache>,
        sessions: Arc<SessionStore>,
        metrics: Arc<UsageMetrics>,
    }

    fn harness(backend: Arc<dyn InferenceBackend>, capacity: usize) -> Harness {
        let cache = Arc::new(ResponseCache::new(capacity).unwrap());
        let sessions = Arc::new(SessionStore::new());
        let metrics = Arc::new(UsageMetrics::new());
        let service = ChatService::new(
            cache.clone(),
            backend,
            sessions.clone(),
            metrics.clone(),
            InferenceConfig::default(),
        );
        Harness {
            service,
            cache,
            sessions,
            metrics,
        }
    }

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.into(),
            max_tokens: None,
            session_id: None,
        }
    }

    #[tokio::test]
    async fn test_second_identical_prompt_is_cached() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|prompt, max| Ok(format!("{prompt}/{max}")));
        let h = harness(Arc::new(mock), 8);

        let first = h.service.chat(&alice(), request("hi")).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.response, "hi/100");

        let second = h.service.chat(&alice(), request("hi")).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.response, "hi/100");
        assert_eq!(h.cache.size(), 1);
        assert_eq!(h.metrics.cached_responses.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_cache_is_shared_across_users() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(1)
            .returning(|_, _| Ok("shared".into()));
        let h = harness(Arc::new(mock), 8);

        h.service.chat(&alice(), request("same")).await.unwrap();
        let reply = h.service.chat(&bob(), request("same")).await.unwrap();
        assert!(reply.cached);
        assert_eq!(h.sessions.list_for_user("bob").await.len(), 1);
    }

    #[tokio::test]
    async fn test_max_tokens_is_part_of_the_key() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(2)
            .returning(|_, max| Ok(max.to_string()));
        let h = harness(Arc::new(mock), 8);

        let mut req = request("p");
        req.max_tokens = Some(10);
        let a = h.service.chat(&alice(), req.clone()).await.unwrap();
        req.max_tokens = Some(20);
        let b = h.service.chat(&alice(), req).await.unwrap();
        assert_eq!((a.response.as_str(), b.response.as_str()), ("10", "20"));
        assert_eq!(h.cache.size(), 2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_cached() {
        let mut mock = MockInferenceBackend::new();
        let mut calls = 0;
        mock.expect_generate().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(PortalError::Inference("runtime offline".into()))
            } else {
                Ok("recovered".into())
            }
        });
        let h = harness(Arc::new(mock), 8);

        let err = h.service.chat(&alice(), request("q")).await.unwrap_err();
        assert!(matches!(err, PortalError::Inference(_)));
        assert_eq!(h.cache.size(), 0);
        assert_eq!(h.sessions.session_count().await, 0);
        assert_eq!(h.metrics.errors.load(Ordering::Relaxed), 1);

        let ok = h.service.chat(&alice(), request("q")).await.unwrap();
        assert!(!ok.cached);
        assert_eq!(ok.response, "recovered");
    }

    #[tokio::test]
    async fn test_unknown_session_rejected_before_inference() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().never();
        let h = harness(Arc::new(mock), 8);

        let mut req = request("q");
        req.session_id = Some(99);
        let err = h.service.chat(&alice(), req).await.unwrap_err();
        assert!(matches!(err, PortalError::NotFound(_)));
        assert_eq!(h.cache.size(), 0);
    }

    #[tokio::test]
    async fn test_foreign_session_rejected() {
        let h = harness(Arc::new(FallbackBackend::new("tinyllama")), 8);
        let first = h.service.chat(&alice(), request("mine")).await.unwrap();

        let mut req = request("intrude");
        req.session_id = Some(first.session_id);
        let err = h.service.chat(&bob(), req).await.unwrap_err();
        assert!(matches!(err, PortalError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_continues_existing_session() {
        let h = harness(Arc::new(FallbackBackend::new("tinyllama")), 8);
        let first = h.service.chat(&alice(), request("hello")).await.unwrap();

        let mut req = request("how are you");
        req.session_id = Some(first.session_id);
        let second = h.service.chat(&alice(), req).await.unwrap();
        assert_eq!(second.session_id, first.session_id);

        let session = h
            .sessions
            .get_for_user(first.session_id, "alice")
            .await
            .unwrap();
        assert_eq!(session.title, "hello");
        assert_eq!(session.messages.len(), 4);
    }

    #[tokio::test]
    async fn test_cached_reply_is_still_recorded() {
        let h = harness(Arc::new(FallbackBackend::new("tinyllama")), 8);
        h.service.chat(&alice(), request("hello")).await.unwrap();
        let again = h.service.chat(&alice(), request("hello")).await.unwrap();
        assert!(again.cached);
        assert_eq!(h.sessions.message_count().await, 4);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate().never();
        let h = harness(Arc::new(mock), 8);

        let err = h.service.chat(&alice(), request("   ")).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidRequest(_)));

        let mut zero = request("q");
        zero.max_tokens = Some(0);
        let err = h.service.chat(&alice(), zero).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidRequest(_)));

        let mut huge = request("q");
        huge.max_tokens = Some(1_000_000);
        let err = h.service.chat(&alice(), huge).await.unwrap_err();
        assert!(matches!(err, PortalError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_lru_eviction_through_service() {
        let mut mock = MockInferenceBackend::new();
        mock.expect_generate()
            .times(4)
            .returning(|prompt, _| Ok(prompt.to_uppercase()));
        let h = harness(Arc::new(mock), 2);

        h.service.chat(&alice(), request("a")).await.unwrap();
        h.service.chat(&alice(), request("b")).await.unwrap();
        // Touch "a" so "b" becomes least recently used.
        assert!(h.service.chat(&alice(), request("a")).await.unwrap().cached);
        h.service.chat(&alice(), request("c")).await.unwrap();
        assert!(h.service.chat(&alice(), request("a")).await.unwrap().cached);
        // "b" was evicted and must be regenerated.
        assert!(!h.service.chat(&alice(), request("b")).await.unwrap().cached);
        assert_eq!(h.cache.size(), 2);
    }
}
