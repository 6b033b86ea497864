//! PocketLLM: a minimal LLM chat portal.
//!
//! The interesting piece is [`cache::RecencyCache`], a bounded LRU map that
//! [`chat::ChatService`] uses to memoize inference. Around it sit the HTTP
//! API ([`api`]), in-memory sessions ([`session`]) and configuration
//! ([`config`]).

pub mod api;
pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod health;
pub mod inference;
pub mod session;

pub use cache::{CacheStats, RecencyCache, ResponseCache};
pub use config::Config;
pub use error::{PortalError, Result};
