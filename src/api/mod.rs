//! Churn backend API access.
//!
//! This module defines the `ChurnApi` trait the aggregator depends on and
//! the reqwest-backed implementation used by the CLI.

pub mod client;

pub use client::{ChurnApi, ClientConfig, DataFetchError, HttpChurnClient};
