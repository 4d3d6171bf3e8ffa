//! Markdown and JSON dashboard reports.
//!
//! This module renders the churn dashboard: summary cards followed by the
//! ranked list of high-risk customers.

use crate::models::{ChurnCustomerView, Report, ReportMetadata, RiskLevel, SummaryStats};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Churn Dashboard\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_customers_section(&report.customers));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Churn Service:** {}\n", metadata.api_url));
    section.push_str(&format!("- **Table:** `{}`\n", metadata.table_name));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Customers Analyzed:** {}\n",
        metadata.customers_analyzed
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary cards.
fn generate_summary_section(summary: &SummaryStats) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| High Risk Customers | At-Risk Revenue | Retention Rate |\n");
    section.push_str("|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} {} | ${}K | {:.1}% |\n\n",
        RiskLevel::High.emoji(),
        summary.high_risk_count,
        summary.at_risk_revenue_thousands,
        summary.retention_rate_percent
    ));
    section.push_str("*At-risk revenue is an estimate per high-risk customer, ");
    section.push_str("not a revenue forecast.*\n\n");

    section
}

/// Generate the ranked customer table.
fn generate_customers_section(customers: &[ChurnCustomerView]) -> String {
    let mut section = String::new();

    section.push_str("## High-Risk Customers\n\n");

    if customers.is_empty() {
        section.push_str("No customers with churn predictions were found.\n\n");
        return section;
    }

    section.push_str("| # | ID | Customer | Email | Churn | Risk | Last Purchase | Total Spent |\n");
    section.push_str("|:---:|:---|:---|:---|:---:|:---|:---|---:|\n");

    for (rank, customer) in customers.iter().enumerate() {
        section.push_str(&generate_customer_row(rank + 1, customer));
    }
    section.push('\n');

    section
}

/// Generate a single customer row.
fn generate_customer_row(rank: usize, customer: &ChurnCustomerView) -> String {
    format!(
        "| {} | `{}` | {} | {} | {}% | {} {} | {} | {} |\n",
        rank,
        customer.id,
        escape_cell(&customer.name),
        escape_cell(&customer.email),
        customer.churn_probability,
        customer.risk_level.emoji(),
        customer.risk_level,
        escape_cell(&customer.last_purchase),
        escape_cell(&customer.total_spent),
    )
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by churnboard*\n");

    footer
}

/// Console line for one customer, used by `--customer`.
pub fn format_customer_line(customer: &ChurnCustomerView) -> String {
    format!(
        "{} {} <{}> - {}% ({}) | last purchase: {} | total spent: {}",
        customer.risk_level.emoji(),
        customer.name,
        customer.email,
        customer.churn_probability,
        customer.risk_level,
        customer.last_purchase,
        customer.total_spent
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
