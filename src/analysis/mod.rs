//! Analysis modules.
//!
//! Turns raw churn predictions into the ranked dashboard view.

pub mod aggregator;

pub use aggregator::*;
