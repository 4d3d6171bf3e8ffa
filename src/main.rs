//! Churnboard - churn risk dashboard for e-commerce analytics
//!
//! A CLI that pulls churn predictions and customer records from the
//! churn service, ranks the customers most likely to churn and writes a
//! dashboard report.
//!
//! Exit codes:
//!   0 - Success (below --fail-on-high-risk, or no threshold set)
//!   1 - Runtime error (backend unreachable, config, write failure, etc.)
//!   2 - High-risk count reached the --fail-on-high-risk threshold

use anyhow::{Context, Result};
use chrono::Utc;
use churnboard::analysis::{
    AggregatorOptions, ChurnAggregator, Dashboard, DashboardState, FlatRateEstimator,
};
use churnboard::api::{ChurnApi, ClientConfig, HttpChurnClient};
use churnboard::cli::{Args, OutputFormat};
use churnboard::config::{Config, CONFIG_FILE_NAME};
use churnboard::models::{Report, ReportMetadata};
use churnboard::report;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Churnboard v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Churnboard failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .churnboard.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to point at your churn service and tune the ranking.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected command. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let client = HttpChurnClient::new(ClientConfig {
        base_url: config.api.base_url.clone(),
        timeout_seconds: config.api.timeout_seconds,
    })?;

    let options = AggregatorOptions {
        table_name: config.api.table_name.clone(),
        top_n: config.aggregation.top_n,
        concurrency: config.api.concurrency,
        high_risk_threshold: config.aggregation.high_risk_threshold,
    };
    let aggregator = ChurnAggregator::new(client, options).with_estimator(FlatRateEstimator {
        per_customer: config.aggregation.revenue_per_customer,
    });

    if let Some(customer_id) = args.customer {
        return show_customer(&aggregator, customer_id).await;
    }

    if args.list_customers {
        return list_customers(&aggregator, &config).await;
    }

    run_dashboard(&aggregator, &config, &args).await
}

/// Fetch, aggregate and write the dashboard report.
async fn run_dashboard(
    aggregator: &ChurnAggregator<HttpChurnClient>,
    config: &Config,
    args: &Args,
) -> Result<i32> {
    let start_time = Instant::now();

    println!("📥 Fetching churn predictions");
    println!("   Service: {}", config.api.base_url);
    println!("   Table: {}", config.api.table_name);

    let spinner = loading_spinner(args.quiet);
    let state = aggregator.load().await;
    spinner.finish_and_clear();

    let dashboard = match state {
        DashboardState::Ready(dashboard) => dashboard,
        DashboardState::Error(message) => {
            eprintln!(
                "\n⚠️  Could not load churn data. Make sure the churn service is reachable at {}",
                aggregator.api().base_url()
            );
            anyhow::bail!(message);
        }
        DashboardState::Loading => anyhow::bail!("Dashboard load did not complete"),
    };

    let duration = start_time.elapsed().as_secs_f64();
    let report = build_report(dashboard, config, duration);

    println!("\n📝 Generating report...");
    let output = match config.report.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    std::fs::write(&config.report.output, &output)
        .with_context(|| format!("Failed to write report to {}", config.report.output))?;

    let summary = &report.summary;
    println!("\n📊 Churn Summary:");
    println!("   Customers analyzed: {}", report.metadata.customers_analyzed);
    println!("   🔴 High risk customers: {}", summary.high_risk_count);
    println!("   💸 At-risk revenue: ${}K", summary.at_risk_revenue_thousands);
    println!("   🎯 Retention rate: {:.1}%", summary.retention_rate_percent);
    if let Some(top) = report.customers.first() {
        println!("   Highest risk: {}", report::format_customer_line(top));
    }
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Dashboard complete! Report saved to: {}", config.report.output);

    if let Some(threshold) = args.fail_on_high_risk {
        if summary.high_risk_count >= threshold {
            eprintln!(
                "\n⛔ {} high-risk customers (threshold {}). Failing (exit code 2).",
                summary.high_risk_count, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

fn build_report(dashboard: Dashboard, config: &Config, duration_seconds: f64) -> Report {
    Report {
        metadata: ReportMetadata {
            api_url: config.api.base_url.clone(),
            table_name: config.api.table_name.clone(),
            generated_at: Utc::now(),
            customers_analyzed: dashboard.customer_count,
            duration_seconds,
        },
        summary: dashboard.summary,
        customers: dashboard.customers,
    }
}

/// Handle --customer: print a single customer's churn profile.
async fn show_customer(
    aggregator: &ChurnAggregator<HttpChurnClient>,
    customer_id: i64,
) -> Result<i32> {
    println!("🔍 Looking up customer {}...", customer_id);

    match aggregator.customer_profile(customer_id).await? {
        Some(view) => {
            println!("\n   {}", report::format_customer_line(&view));
            Ok(0)
        }
        None => {
            warn!("No churn prediction or record for customer {}", customer_id);
            println!("\n   No churn prediction available for customer {}.", customer_id);
            Ok(0)
        }
    }
}

/// Handle --list-customers: print the rows of the configured table.
async fn list_customers(
    aggregator: &ChurnAggregator<HttpChurnClient>,
    config: &Config,
) -> Result<i32> {
    let customers = aggregator
        .api()
        .all_customers(&config.api.table_name)
        .await
        .context("Failed to fetch customers")?;

    if customers.is_empty() {
        println!("   No customers found in table {}.", config.api.table_name);
        return Ok(0);
    }

    println!(
        "   Found {} customers in table {}:\n",
        customers.len(),
        config.api.table_name
    );
    for customer in &customers {
        println!(
            "     👤 {:>6}  {}",
            customer.customer_id,
            customer.name.as_deref().unwrap_or("(unnamed)")
        );
    }
    Ok(0)
}

fn loading_spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Loading predictions and customer records...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
