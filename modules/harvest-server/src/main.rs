use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use harvest_core::HarvestConfig;
use harvest_server::{build_harvester, init_tracing, routes};

#[derive(Parser)]
#[command(name = "harvest-server", about = "Review harvest job endpoint")]
struct Cli {
    /// Path to config TOML file. Defaults and env vars apply without one.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = HarvestConfig::load(cli.config.as_deref())?;
    config.log_redacted();
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let harvester = Arc::new(build_harvester(config)?);
    let app = routes::build_router(harvester);

    info!("Harvest server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
