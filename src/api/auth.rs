//! Authentication helpers for the portal API.
//!
//! Callers present a static bearer token from the config. Each token maps to
//! a [`Principal`] (username + [`Role`]); admin-only routes check the role.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{PortalError, Result};

// ============================================================================
// Identity
// ============================================================================

/// What a token holder may do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Chat and read own sessions.
    #[default]
    User,
    /// Everything a user can, plus metrics and cache administration.
    Admin,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// # Errors
    ///
    /// Returns [`PortalError::Forbidden`] for non-admin principals.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PortalError::Forbidden("admin only".to_string()))
        }
    }
}

// ============================================================================
// API Token
// ============================================================================

/// Generates a random 64-character hex API token.
///
/// Two UUID v4 values, hex-encoded without hyphens, concatenated.
///
/// # Example
///
/// ```
/// let token = pocketllm::api::auth::generate_api_token();
/// assert_eq!(token.len(), 64);
/// assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
pub fn generate_api_token() -> String {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!("{a}{b}")
}

// ============================================================================
// Bearer token verification
// ============================================================================

/// Static token table built from [`AuthConfig`].
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    entries: Vec<(String, Principal)>,
}

impl TokenTable {
    pub fn from_config(config: &AuthConfig) -> Self {
        let entries = config
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Principal {
                        username: t.username.clone(),
                        role: t.role,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verifies an `Authorization: Bearer <token>` header value.
    ///
    /// The `"Bearer "` prefix is case-sensitive. Every configured token is
    /// compared in constant time, so lookup time does not reveal which
    /// entry matched.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Unauthorized`] when the prefix is missing or
    /// no configured token matches.
    pub fn verify_bearer(&self, header: &str) -> Result<Principal> {
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| PortalError::Unauthorized("missing Bearer prefix".to_string()))?;

        let mut found = None;
        for (candidate, principal) in &self.entries {
            if bool::from(candidate.as_bytes().ct_eq(token.as_bytes())) {
                found = Some(principal);
            }
        }
        found
            .cloned()
            .ok_or_else(|| PortalError::Unauthorized("invalid API token".to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
