pub mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use harvest_core::{
    FsFlatSink, HarvestConfig, Harvester, Persistence, PgReviewStore, StructuredSink,
    WebDriverSessionFactory,
};

/// Install the global subscriber, writing to stderr. JSON lines when
/// `LOG_FORMAT=json`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("harvest_core=info,harvest_server=info,webdriver_client=info")
    });

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Wire the production collaborators: WebDriver sessions, the filesystem
/// snapshot sink, and Postgres when `database_url` is set.
pub fn build_harvester(config: HarvestConfig) -> Result<Harvester> {
    let sessions = WebDriverSessionFactory::new(&config.webdriver)
        .context("Invalid WebDriver configuration")?;

    let flat = FsFlatSink::new(config.storage.snapshot_dir.clone());

    let structured: Option<Arc<dyn StructuredSink>> = match &config.storage.database_url {
        Some(url) => Some(Arc::new(
            PgReviewStore::connect_lazy(url).context("Invalid DATABASE_URL")?,
        )),
        None => {
            tracing::warn!("DATABASE_URL not set, reviews go to the snapshot only");
            None
        }
    };

    Ok(Harvester::new(
        Arc::new(config),
        Arc::new(sessions),
        Persistence::new(Arc::new(flat), structured),
    ))
}
