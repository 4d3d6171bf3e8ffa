//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Values left unset fall back to
//! `.churnboard.toml` and then to built-in defaults.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Churnboard - churn risk dashboard for e-commerce analytics backends
///
/// Pulls churn predictions and customer records from the churn service,
/// ranks the customers most likely to churn and writes a Markdown or
/// JSON dashboard report.
///
/// Examples:
///   churnboard
///   churnboard --api-url http://analytics:8000 --table retail --top 20
///   churnboard --format json --output churn.json
///   churnboard --customer 44605
///   churnboard --fail-on-high-risk 100
///   churnboard --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Base URL of the churn service
    ///
    /// Default: from config or http://127.0.0.1:8000.
    #[arg(long, value_name = "URL", env = "CHURNBOARD_API_URL")]
    pub api_url: Option<String>,

    /// Table the predictions are computed for (default: ecommerce)
    #[arg(short, long, value_name = "NAME")]
    pub table: Option<String>,

    /// Number of highest-risk customers to include (default: 10)
    #[arg(long, value_name = "COUNT")]
    pub top: Option<usize>,

    /// Maximum concurrent customer lookups (default: 8)
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Request timeout in seconds (default: 30)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .churnboard.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report (default: churn_report.md)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Show the churn profile of a single customer and exit
    #[arg(long, value_name = "ID", conflicts_with = "list_customers")]
    pub customer: Option<i64>,

    /// List the customers in the table and exit
    #[arg(long)]
    pub list_customers: bool,

    /// Fail if at least this many high-risk customers are found
    ///
    /// Useful for scheduled checks. Exit code 2 when the threshold is reached.
    #[arg(long, value_name = "COUNT")]
    pub fail_on_high_risk: Option<usize>,

    /// Generate a default .churnboard.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref table) = self.table {
            if table.trim().is_empty() {
                return Err("Table name must not be empty".to_string());
            }
        }

        if self.top == Some(0) {
            return Err("Top must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
