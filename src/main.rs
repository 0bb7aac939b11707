// ABOUTME: Entry point for the quayd daemon.
// ABOUTME: Parses arguments, loads configuration and serves the REST API.

mod cli;

use clap::Parser;
use cli::Cli;
use nonempty::NonEmpty;
use quayd::api;
use quayd::config::{DaemonConfig, ListenAddress};
use quayd::daemon::Daemon;
use quayd::error::{Error, Result};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let default = if cli.verbose || cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = env::current_dir()?;
    let mut config = DaemonConfig::discover(cli.config.as_deref(), &cwd)?;

    if cli.debug {
        config.debug = true;
    }
    let listen = cli
        .listen
        .iter()
        .map(|raw| raw.parse::<ListenAddress>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    if let Some(listen) = NonEmpty::from_vec(listen) {
        config.listen = listen;
    }

    let listen = config.listen.clone();
    let daemon = Daemon::new(config).await?;
    daemon.spawn_housekeeping();

    api::server::serve(api::router(daemon), &listen).await
}
