//! One-shot harvest: `harvest --url <URL>`. Prints the job response as
//! JSON and exits non-zero unless the run succeeded.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use harvest_core::{HarvestConfig, JobRequest};
use harvest_server::{build_harvester, init_tracing};

#[derive(Parser)]
#[command(name = "harvest", about = "Collect new reviews for one place")]
struct Cli {
    /// Place listing URL.
    #[arg(long)]
    url: String,

    /// Path to config TOML file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = HarvestConfig::load(cli.config.as_deref())?;
    config.log_redacted();
    let harvester = build_harvester(config)?;

    let response = harvester.handle(JobRequest::new(cli.url)).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
