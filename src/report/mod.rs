//! Report generation.

pub mod generator;

pub use generator::{format_customer_line, generate_json_report, generate_markdown_report};
