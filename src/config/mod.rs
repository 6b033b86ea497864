//! Configuration for PocketLLM.
//!
//! Loaded from `~/.pocketllm/config.json` (or an explicit path), then
//! overlaid with `POCKETLLM_*` environment variables. A missing file yields
//! defaults. [`Config::validate`] must pass before the portal starts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::auth::Role;
pub use crate::api::config::ServerConfig;
use crate::cache::ResponseCache;
use crate::error::{PortalError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub inference: InferenceConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached responses. Must be at least 1.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: ResponseCache::DEFAULT_CAPACITY,
        }
    }
}

/// Inference settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Model name reported by the backend.
    pub model: String,
    /// `max_tokens` used when a chat request omits it.
    pub default_max_tokens: u32,
    /// Largest `max_tokens` a chat request may ask for.
    pub max_tokens_limit: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model: "tinyllama".to_string(),
            default_max_tokens: 100,
            max_tokens_limit: 4096,
        }
    }
}

/// A static bearer token and the identity it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub username: String,
    #[serde(default)]
    pub role: Role,
}

/// Static token table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

impl AuthConfig {
    /// Add a freshly generated admin token when none is configured.
    ///
    /// Returns the new token so the caller can show it once.
    pub fn ensure_admin_token(&mut self) -> Option<String> {
        if self.tokens.iter().any(|t| t.role == Role::Admin) {
            return None;
        }
        let token = crate::api::auth::generate_api_token();
        self.tokens.push(TokenConfig {
            token: token.clone(),
            username: "admin".to_string(),
            role: Role::Admin,
        });
        Some(token)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Config {
    /// Default config file location: `~/.pocketllm/config.json`.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Base directory for PocketLLM files: `~/.pocketllm`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pocketllm")
    }

    /// Load from `path` (defaults if it does not exist), then apply
    /// environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                PortalError::Config(format!("invalid config file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Overlay `POCKETLLM_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`, keyed by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("POCKETLLM_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("POCKETLLM_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                PortalError::Config(format!("POCKETLLM_PORT must be a port number, got {port:?}"))
            })?;
        }
        if let Some(origin) = lookup("POCKETLLM_CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(capacity) = lookup("POCKETLLM_CACHE_CAPACITY") {
            self.cache.capacity = capacity.trim().parse().map_err(|_| {
                PortalError::Config(format!(
                    "POCKETLLM_CACHE_CAPACITY must be a positive integer, got {capacity:?}"
                ))
            })?;
        }
        if let Some(model) = lookup("POCKETLLM_MODEL") {
            self.inference.model = model;
        }
        if let Some(json) = lookup("POCKETLLM_LOG_JSON") {
            self.logging.json = parse_flag("POCKETLLM_LOG_JSON", &json)?;
        }
        if let Some(token) = lookup("POCKETLLM_ADMIN_TOKEN") {
            self.upsert_token(token, "admin", Role::Admin);
        }
        if let Some(token) = lookup("POCKETLLM_USER_TOKEN") {
            self.upsert_token(token, "user", Role::User);
        }
        Ok(())
    }

    fn upsert_token(&mut self, token: String, username: &str, role: Role) {
        self.auth.tokens.retain(|t| t.username != username);
        self.auth.tokens.push(TokenConfig {
            token,
            username: username.to_string(),
            role,
        });
    }

    /// Reject settings the portal cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(PortalError::Config(
                "cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(PortalError::Config("server.port must not be 0".to_string()));
        }
        if self.inference.max_tokens_limit == 0 {
            return Err(PortalError::Config(
                "inference.max_tokens_limit must be at least 1".to_string(),
            ));
        }
        if self.inference.default_max_tokens == 0
            || self.inference.default_max_tokens > self.inference.max_tokens_limit
        {
            return Err(PortalError::Config(format!(
                "inference.default_max_tokens must be between 1 and {}",
                self.inference.max_tokens_limit
            )));
        }
        let mut seen = HashSet::new();
        for entry in &self.auth.tokens {
            if entry.token.trim().is_empty() {
                return Err(PortalError::Config(format!(
                    "auth token for {:?} is empty",
                    entry.username
                )));
            }
            if !seen.insert(entry.token.as_str()) {
                return Err(PortalError::Config(format!(
                    "auth token for {:?} is configured more than once",
                    entry.username
                )));
            }
        }
        Ok(())
    }
}

/// Parse an on/off environment value, case-insensitively.
fn parse_flag(name: &str, value: &str) -> Result<bool> {
    let value = value.trim();
    if ["1", "true", "yes", "on"]
        .iter()
        .any(|v| value.eq_ignore_ascii_case(v))
    {
        Ok(true)
    } else if ["0", "false", "no", "off"]
        .iter()
        .any(|v| value.eq_ignore_ascii_case(v))
    {
        Ok(false)
    } else {
        Err(PortalError::Config(format!("{name} must be true or false, got {value:?}")))
    }
}
