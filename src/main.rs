//! mangad - manga story and storyboard generation server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mangad::config::LogFormat;
use mangad::{Config, Server};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Manga story and storyboard generation server
#[derive(Parser, Debug)]
#[command(name = "mangad", version, about)]
struct Args {
    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Path to a TOML config file (default: mangad.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mangad=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys may live in a .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    init_tracing(config.log_format);

    let server = Arc::new(Server::new(config)?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
