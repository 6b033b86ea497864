//! `pocketllm config` command.

use anyhow::{Context, Result};

use pocketllm::api::auth::Role;
use pocketllm::config::Config;

const REDACTED: &str = "<redacted>";

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (tokens redacted)
    Show,
    /// Validate the effective configuration
    Check,
}

pub(crate) fn cmd_config(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&redacted(config))
                .context("Failed to render config")?;
            println!("{json}");
        }
        ConfigAction::Check => {
            config.validate().context("Invalid configuration")?;
            if !config.auth.tokens.iter().any(|t| t.role == Role::Admin) {
                println!("Note: no admin token configured; `serve` will generate one.");
            }
            println!("Configuration OK");
        }
    }
    Ok(())
}

/// Copy of `config` with every bearer token masked.
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    for entry in &mut shown.auth.tokens {
        entry.token = REDACTED.to_string();
    }
    shown
}
