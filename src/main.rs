use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bandmap_refresh::config::{
    AppConfig, CliConfig, Credentials, FileConfig, DEFAULT_API_BASE_URL, DEFAULT_OAUTH_URL,
};
use bandmap_refresh::fetcher::Mx3Client;
use bandmap_refresh::geodata::load_municipalities;
use bandmap_refresh::refresh::{Orchestrator, RefreshOutcome};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path = PathBuf::from(s);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path))
}

/// Fetch Swiss gig listings and refresh the municipality map artifact.
#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the artifact and, by default, the reference geodata.
    #[clap(value_parser = parse_path)]
    pub data_dir: PathBuf,

    /// Path to the municipality GeoJSON reference file. Defaults to
    /// gemeinden.geojson inside the data directory.
    #[clap(long, value_parser = parse_path)]
    pub geodata_path: Option<PathBuf>,

    /// Path to a TOML config file; file values override CLI values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Base URL of the MX3 API.
    #[clap(long, default_value = DEFAULT_API_BASE_URL)]
    pub api_base_url: String,

    /// OAuth token endpoint.
    #[clap(long, default_value = DEFAULT_OAUTH_URL)]
    pub oauth_url: String,

    /// Gigs requested per API page.
    #[clap(long, default_value_t = 100)]
    pub page_size: u32,

    /// HTTP request timeout in seconds.
    #[clap(long, default_value_t = 30)]
    pub request_timeout_sec: u64,

    /// Maximum artifact age in hours before a refresh is triggered.
    #[clap(long, default_value_t = 24)]
    pub staleness_hours: u64,

    /// Fuzzy match acceptance threshold, on a 0-1 scale.
    #[clap(long, default_value_t = 0.80)]
    pub fuzzy_threshold: f64,

    /// Boundary simplification tolerance for the web geometry output.
    #[clap(long, default_value_t = 0.007)]
    pub simplify_tolerance: f64,

    /// Maximum fetch attempts per refresh cycle.
    #[clap(long, default_value_t = 3)]
    pub max_fetch_attempts: u32,

    /// Refresh even when the existing artifact is still fresh.
    #[clap(long)]
    pub force: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            data_dir: Some(self.data_dir.clone()),
            geodata_path: self.geodata_path.clone(),
            api_base_url: self.api_base_url.clone(),
            oauth_url: self.oauth_url.clone(),
            page_size: self.page_size,
            request_timeout_sec: self.request_timeout_sec,
            staleness_hours: self.staleness_hours,
            fuzzy_threshold: self.fuzzy_threshold,
            simplify_tolerance: self.simplify_tolerance,
            max_fetch_attempts: self.max_fetch_attempts,
            force: self.force,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!("bandmap refresh starting (git {})", env!("GIT_HASH"));

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    let credentials = Credentials::from_env()?;

    info!(
        "Loading municipality reference set from {:?}...",
        config.geodata_path
    );
    let index = Arc::new(
        load_municipalities(&config.geodata_path)
            .context("Cannot refresh without reference geodata")?,
    );

    let fetcher = Arc::new(Mx3Client::new(config.api.clone(), credentials)?);
    let orchestrator = Orchestrator::new(config.refresh.clone(), fetcher, index);

    let outcome = orchestrator.run().await;
    match &outcome {
        RefreshOutcome::Refreshed(artifact) => {
            info!(
                "Artifact refreshed: {} gigs across {} municipalities, {} unmatched locations",
                artifact.summary.total_matched,
                artifact.summary.municipalities_with_gigs,
                artifact.summary.unmatched_locations.len()
            );
        }
        RefreshOutcome::SkippedFresh { age_hours } => {
            info!("Artifact still fresh ({}h old), nothing to do", age_hours);
        }
        RefreshOutcome::FellBack {
            error,
            prior_artifact,
        } => {
            if *prior_artifact {
                error!("Refresh failed, previous artifact kept: {}", error);
            } else {
                error!("Refresh failed and no previous artifact exists: {}", error);
            }
        }
    }

    let exit_code = outcome.exit_code();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
