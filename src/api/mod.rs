// All submodules use axum/tower-http; auth uses subtle for token checks.

pub mod auth;
pub mod config;
pub mod middleware;
pub mod routes;
pub mod server;
