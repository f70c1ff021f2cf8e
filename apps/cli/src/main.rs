//! `clientsync` - sync service clients from the central server into a local
//! SQLite cache and list who is due back.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod context;

use cli::Cli;
use context::{resolve_settings, AppContext};

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    setup_logging();
    let cli = Cli::parse();

    let result = async {
        let settings = resolve_settings(&cli)?;
        let ctx = AppContext::build(settings)?;
        commands::run(&ctx, cli.command, cli.output).await
    }
    .await;

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
