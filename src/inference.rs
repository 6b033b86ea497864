//! Inference backends.
//!
//! The chat service talks to an [`InferenceBackend`] trait object. The only
//! backend shipped is [`FallbackBackend`], which answers with canned replies
//! so the portal works without a model runtime.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;

/// Something that turns a prompt into generated text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Generate a response of at most roughly `max_tokens` tokens.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Prepare the backend (e.g. fetch model weights). Runs in the
    /// background at startup; serving does not wait for it.
    async fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

/// Canned-reply backend used when no model runtime is available.
#[derive(Debug, Clone)]
pub struct FallbackBackend {
    model: String,
}

/// Keyword → reply table, checked in order against the lowercased prompt.
const CANNED_REPLIES: &[(&str, &str)] = &[
    ("hello", "Hello! I'm PocketLLM. How can I help you today?"),
    (
        "what",
        "I'm a lightweight language model running on CPU. I can answer questions and have conversations.",
    ),
    (
        "how",
        "I use quantized models to run efficiently on limited resources.",
    ),
];

const ECHO_PREVIEW_CHARS: usize = 50;

impl FallbackBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    fn reply(&self, prompt: &str) -> String {
        let lowered = prompt.to_lowercase();
        if let Some((_, reply)) = CANNED_REPLIES
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
        {
            return (*reply).to_string();
        }
        let preview: String = prompt.chars().take(ECHO_PREVIEW_CHARS).collect();
        format!(
            "I received your message: '{preview}...' The {} model runtime is currently unavailable, so this is a fallback response.",
            self.model
        )
    }
}

#[async_trait]
impl InferenceBackend for FallbackBackend {
    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        Ok(self.reply(prompt))
    }

    async fn warm_up(&self) -> Result<()> {
        info!(model = %self.model, "No model runtime configured, serving fallback responses");
        Ok(())
    }
}

/// Run [`InferenceBackend::warm_up`] on a background task.
///
/// Failures are logged; the portal keeps serving either way.
pub fn spawn_warm_up(backend: Arc<dyn InferenceBackend>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = backend.warm_up().await {
            warn!("Inference backend warm-up failed, continuing without it: {}", e);
        }
    })
}
