//! Command-line interface.

mod config_cmd;
mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use pocketllm::config::Config;

const DEFAULT_LOG_FILTER: &str = "pocketllm=info,tower_http=info";

#[derive(Parser, Debug)]
#[command(name = "pocketllm", version, about = "Minimal LLM chat portal")]
pub struct Cli {
    /// Config file (default: ~/.pocketllm/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format (overrides logging.json in the config)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the portal API server
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
        /// Port (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: config_cmd::ConfigAction,
    },
    /// Print a new random API token for the auth.tokens table
    Token,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// `--log-format` wins over `logging.json` from the config.
    fn json_logs(&self, config: &Config) -> bool {
        match self.log_format {
            Some(format) => format == LogFormat::Json,
            None => config.logging.json,
        }
    }
}

/// Dispatch the parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.json_logs(&config));

    match cli.command {
        Command::Serve { bind, port } => serve::cmd_serve(config, bind, port).await,
        Command::Config { action } => config_cmd::cmd_config(&config, action),
        Command::Token => {
            println!("{}", pocketllm::api::auth::generate_api_token());
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let path = path.map(PathBuf::from).unwrap_or_else(Config::path);
    Config::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
