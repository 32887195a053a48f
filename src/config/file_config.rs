use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML configuration. Every field overrides the corresponding CLI
/// value when present.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct FileConfig {
    pub data_dir: Option<String>,
    pub geodata_path: Option<String>,
    pub api_base_url: Option<String>,
    pub oauth_url: Option<String>,
    /// Canton codes to sweep; defaults to all 26.
    pub cantons: Option<Vec<String>>,
    pub page_size: Option<u32>,
    pub request_timeout_sec: Option<u64>,
    pub staleness_hours: Option<u64>,
    pub fuzzy_threshold: Option<f64>,
    pub simplify_tolerance: Option<f64>,
    pub retry: Option<RetryConfig>,
}

/// Fetch retry tuning, its own TOML section.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_fetch_attempts: Option<u32>,
    pub initial_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            staleness_hours = 6
            fuzzy_threshold = 0.9

            [retry]
            max_fetch_attempts = 5
            "#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.staleness_hours, Some(6));
        assert_eq!(config.fuzzy_threshold, Some(0.9));
        assert_eq!(config.retry.unwrap().max_fetch_attempts, Some(5));
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = FileConfig::load(Path::new("/nonexistent/refresh.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "staleness_hours = [not toml").unwrap();

        let result = FileConfig::load(file.path());
        assert!(result.unwrap_err().to_string().contains("parse"));
    }
}
