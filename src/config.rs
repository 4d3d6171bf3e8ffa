//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.churnboard.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".churnboard.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Churn backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the churn service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Table the predictions are computed for.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum concurrent customer lookups.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            table_name: default_table_name(),
            timeout_seconds: default_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_table_name() -> String {
    "ecommerce".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_concurrency() -> usize {
    8
}

/// Ranking and summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Number of customers kept in the ranked list.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Probability above which a prediction counts as high risk.
    #[serde(default = "default_high_risk_threshold")]
    pub high_risk_threshold: f64,

    /// Revenue attributed to each high-risk customer.
    #[serde(default = "default_revenue_per_customer")]
    pub revenue_per_customer: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            high_risk_threshold: default_high_risk_threshold(),
            revenue_per_customer: default_revenue_per_customer(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_high_risk_threshold() -> f64 {
    crate::models::HIGH_RISK_THRESHOLD
}

fn default_revenue_per_customer() -> f64 {
    2500.0
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output() -> String {
    "churn_report.md".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from a directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Try to load configuration from the current directory.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly provided CLI values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(ref table) = args.table {
            self.api.table_name = table.clone();
        }
        if let Some(timeout) = args.timeout {
            self.api.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.api.concurrency = concurrency;
        }

        if let Some(top) = args.top {
            self.aggregation.top_n = top;
        }

        if let Some(ref output) = args.output {
            self.report.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
    }

    /// Check values that serde cannot constrain.
    pub fn validate(&self) -> Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            anyhow::bail!("API URL must start with 'http://' or 'https://'");
        }
        if self.api.table_name.trim().is_empty() {
            anyhow::bail!("Table name must not be empty");
        }
        if self.api.timeout_seconds == 0 {
            anyhow::bail!("Timeout must be at least 1 second");
        }
        if self.api.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        if self.aggregation.top_n == 0 {
            anyhow::bail!("Top-N must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.aggregation.high_risk_threshold) {
            anyhow::bail!("High-risk threshold must be between 0.0 and 1.0");
        }
        if self.aggregation.revenue_per_customer < 0.0 {
            anyhow::bail!("Revenue per customer must not be negative");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;
    use std::path::PathBuf;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.api.table_name, "ecommerce");
        assert_eq!(config.aggregation.top_n, 10);
        assert_eq!(config.aggregation.high_risk_threshold, 0.8);
        assert_eq!(config.aggregation.revenue_per_customer, 2500.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[api]
base_url = "http://analytics.internal:9000"
table_name = "retail"

[aggregation]
top_n = 25
high_risk_threshold = 0.75

[report]
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.api.base_url, "http://analytics.internal:9000");
        assert_eq!(config.api.table_name, "retail");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.aggregation.top_n, 25);
        assert_eq!(config.aggregation.high_risk_threshold, 0.75);
        assert_eq!(config.report.format, OutputFormat::Json);
        assert_eq!(config.report.output, "churn_report.md");
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[api]\ntable_name = \"shop\"\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.api.table_name, "shop");

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[api\nbroken").unwrap();
        assert!(Config::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_merge_only_explicit_args() {
        let mut config: Config = toml::from_str("[api]\ntable_name = \"shop\"\n").unwrap();
        let mut args = make_args();
        args.top = Some(5);
        args.output = Some(PathBuf::from("out.json"));

        config.merge_with_args(&args);

        assert_eq!(config.api.table_name, "shop");
        assert_eq!(config.aggregation.top_n, 5);
        assert_eq!(config.report.output, "out.json");

        args.table = Some("ecommerce".to_string());
        config.merge_with_args(&args);
        assert_eq!(config.api.table_name, "ecommerce");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.aggregation.high_risk_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.base_url = "ftp://host".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.aggregation.top_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[aggregation]"));
        assert!(toml_str.contains("[report]"));
        assert!(toml_str.contains("format = \"markdown\""));
    }
}
