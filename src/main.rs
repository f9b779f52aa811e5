use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pasty::commands::{purge_expired, serve};
use pasty::config::Config;
use pasty::App;

/// Paste storage and lifecycle service.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the TOML config file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Remove expired pastes from storage once and exit.
    PurgeExpired,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).await?;
    let app = App::init(config).await?;

    match cli.command {
        Command::Serve => serve::run(app).await,
        Command::PurgeExpired => purge_expired::run(app).await,
    }
}
