//! Churn risk dashboard for e-commerce analytics backends.
//!
//! The library fetches churn predictions and customer records through a
//! [`api::ChurnApi`], ranks customers by churn risk and renders the result
//! as Markdown or JSON. The `churnboard` binary wires it to the command line.

pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod models;
pub mod report;
