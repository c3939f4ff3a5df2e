mod api;
mod chat;
mod cli;
mod router;
mod startup;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn load_config() -> intel_core::Config {
    intel_core::config::load_dotenv();
    intel_core::Config::from_env()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    let config = load_config();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();
    config.log_summary();

    cli::dispatch(&config, cli.command.unwrap_or(cli::Command::Serve)).await
}
