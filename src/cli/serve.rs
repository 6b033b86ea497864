//! `pocketllm serve` command.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use pocketllm::api::server::{start_server, AppState};
use pocketllm::config::Config;
use pocketllm::inference::{spawn_warm_up, FallbackBackend, InferenceBackend};

/// Build the portal from `config` and serve until Ctrl-C.
pub(crate) async fn cmd_serve(
    mut config: Config,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(token) = config.auth.ensure_admin_token() {
        warn!("No admin token configured; generated one for this run: {token}");
    }
    config.validate().context("Invalid configuration")?;

    let backend: Arc<dyn InferenceBackend> =
        Arc::new(FallbackBackend::new(config.inference.model.clone()));
    // Warm-up never blocks serving.
    let _warm_up = spawn_warm_up(backend.clone());

    let state = AppState::new(&config, backend).context("Failed to build portal state")?;
    info!(
        cache_capacity = config.cache.capacity,
        tokens = state.tokens.len(),
        model = %config.inference.model,
        "Starting PocketLLM portal"
    );

    start_server(&config.server, state)
        .await
        .map_err(|e| anyhow::anyhow!("Portal server failed: {e}"))
}
