//! HTTP server entry point for the group crawler.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use roster_crawler::{api, error::Result, models::Config, pipeline::GroupsPipeline};

/// Serve NovSU groups over HTTP
#[derive(Parser, Debug)]
#[command(name = "roster-server", version)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config);
    config.apply_env_overrides();
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    let pipeline = Arc::new(GroupsPipeline::from_config(&config)?);
    let app = api::router(pipeline);

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(
        "Roster server listening on {} (cache: {})",
        config.server.bind,
        config.cache.path.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}
