mod file_config;

pub use file_config::{FileConfig, RetryConfig};

use anyhow::{bail, Result};
use std::fmt;
use std::path::PathBuf;

/// The 26 Swiss canton codes swept by default.
pub const SWISS_CANTONS: &[&str] = &[
    "ZH", "BE", "LU", "UR", "SZ", "OW", "NW", "GL", "ZG", "FR", "SO", "BS", "BL", "SH", "AR", "AI",
    "SG", "GR", "AG", "TG", "TI", "VD", "VS", "NE", "GE", "JU",
];

pub const DEFAULT_API_BASE_URL: &str = "https://api.srgssr.ch/mx3/v2";
pub const DEFAULT_OAUTH_URL: &str = "https://api.srgssr.ch/oauth/v1/accesstoken";

/// CLI arguments that can be overridden by TOML config. Mirrors the clap
/// struct in `main.rs` so config resolution stays testable without clap.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub geodata_path: Option<PathBuf>,
    pub api_base_url: String,
    pub oauth_url: String,
    pub page_size: u32,
    pub request_timeout_sec: u64,
    pub staleness_hours: u64,
    pub fuzzy_threshold: f64,
    pub simplify_tolerance: f64,
    pub max_fetch_attempts: u32,
    pub force: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            geodata_path: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            page_size: 100,
            request_timeout_sec: 30,
            staleness_hours: 24,
            fuzzy_threshold: 0.80,
            simplify_tolerance: 0.007,
            max_fetch_attempts: 3,
            force: false,
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub geodata_path: PathBuf,
    pub api: ApiSettings,
    pub refresh: RefreshSettings,
}

/// Everything the MX3 client needs.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub oauth_url: String,
    pub cantons: Vec<String>,
    pub page_size: u32,
    pub request_timeout_sec: u64,
}

/// Everything the refresh orchestrator needs.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub data_dir: PathBuf,
    pub staleness_hours: u64,
    pub fuzzy_threshold: f64,
    pub simplify_tolerance: f64,
    /// Skip the staleness check and always refresh (container-build path).
    pub force: bool,
    pub max_fetch_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_multiplier: f64,
}

impl RefreshSettings {
    pub fn artifact_path(&self) -> PathBuf {
        self.data_dir.join("refresh_artifact.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(".refresh.lock")
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;
        if !data_dir.exists() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let geodata_path = file
            .geodata_path
            .map(PathBuf::from)
            .or_else(|| cli.geodata_path.clone())
            .unwrap_or_else(|| data_dir.join("gemeinden.geojson"));
        if !geodata_path.is_file() {
            bail!("Reference geodata file not found: {:?}", geodata_path);
        }

        let fuzzy_threshold = file.fuzzy_threshold.unwrap_or(cli.fuzzy_threshold);
        if !(0.0..=1.0).contains(&fuzzy_threshold) || fuzzy_threshold == 0.0 {
            bail!("fuzzy_threshold must be in (0, 1], got {}", fuzzy_threshold);
        }

        let page_size = file.page_size.unwrap_or(cli.page_size);
        if page_size == 0 {
            bail!("page_size must be at least 1");
        }

        let cantons = file
            .cantons
            .unwrap_or_else(|| SWISS_CANTONS.iter().map(|c| c.to_string()).collect());
        if cantons.is_empty() {
            bail!("canton list must not be empty");
        }

        let retry = file.retry.unwrap_or_default();
        let max_fetch_attempts = retry.max_fetch_attempts.unwrap_or(cli.max_fetch_attempts);
        if max_fetch_attempts == 0 {
            bail!("max_fetch_attempts must be at least 1");
        }

        Ok(Self {
            geodata_path,
            api: ApiSettings {
                base_url: file
                    .api_base_url
                    .unwrap_or_else(|| cli.api_base_url.clone())
                    .trim_end_matches('/')
                    .to_string(),
                oauth_url: file.oauth_url.unwrap_or_else(|| cli.oauth_url.clone()),
                cantons,
                page_size,
                request_timeout_sec: file
                    .request_timeout_sec
                    .unwrap_or(cli.request_timeout_sec),
            },
            refresh: RefreshSettings {
                data_dir,
                staleness_hours: file.staleness_hours.unwrap_or(cli.staleness_hours),
                fuzzy_threshold,
                simplify_tolerance: file.simplify_tolerance.unwrap_or(cli.simplify_tolerance),
                force: cli.force,
                max_fetch_attempts,
                initial_backoff_secs: retry.initial_backoff_secs.unwrap_or(2),
                max_backoff_secs: retry.max_backoff_secs.unwrap_or(60),
                backoff_multiplier: retry.backoff_multiplier.unwrap_or(2.0),
            },
        })
    }
}

/// Opaque API credentials. Never logged: the `Debug` impl redacts both
/// values.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Read credentials from the environment.
    pub fn from_env() -> Result<Self> {
        let consumer_key = std::env::var("CONSUMER_KEY").ok().filter(|v| !v.is_empty());
        let consumer_secret = std::env::var("CONSUMER_SECRET")
            .ok()
            .filter(|v| !v.is_empty());
        match (consumer_key, consumer_secret) {
            (Some(key), Some(secret)) => Ok(Self::new(key, secret)),
            _ => bail!("CONSUMER_KEY and CONSUMER_SECRET must be set in environment variables"),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &"***")
            .field("consumer_secret", &"***")
            .finish()
    }
}
