//! PocketLLM portal binary.

mod cli;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win.
    let _ = dotenvy::dotenv();
    let cli = cli::Cli::parse();
    cli::run(cli).await
}
