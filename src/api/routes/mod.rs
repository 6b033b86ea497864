//! HTTP route handlers for the portal API.

pub mod admin;
pub mod chat;
pub mod health;
pub mod sessions;
