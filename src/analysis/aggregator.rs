//! Churn aggregation and summary statistics.
//!
//! Joins the per-customer churn predictions with customer records, ranks
//! the result by risk and computes the headline dashboard numbers.

use crate::api::{ChurnApi, DataFetchError};
use crate::models::{
    ChurnCustomerView, ChurnDataset, CustomerRecord, SummaryStats, HIGH_RISK_THRESHOLD,
};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Estimates the revenue exposed by high-risk customers.
pub trait RevenueEstimator: Send + Sync {
    /// Estimated revenue at risk, in currency units.
    fn estimate(&self, high_risk_count: usize) -> f64;
}

/// Fixed value per high-risk customer. A placeholder until a real revenue
/// model exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatRateEstimator {
    pub per_customer: f64,
}

impl Default for FlatRateEstimator {
    fn default() -> Self {
        Self {
            per_customer: 2500.0,
        }
    }
}

impl RevenueEstimator for FlatRateEstimator {
    fn estimate(&self, high_risk_count: usize) -> f64 {
        high_risk_count as f64 * self.per_customer
    }
}

/// Tunables for [`ChurnAggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub table_name: String,
    pub top_n: usize,
    /// Maximum in-flight customer lookups.
    pub concurrency: usize,
    pub high_risk_threshold: f64,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            table_name: "ecommerce".to_string(),
            top_n: 10,
            concurrency: 8,
            high_risk_threshold: HIGH_RISK_THRESHOLD,
        }
    }
}

/// A fully loaded dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub customers: Vec<ChurnCustomerView>,
    pub summary: SummaryStats,
    /// Number of customers in the churn dataset.
    pub customer_count: usize,
}

/// Lifecycle of one dashboard load.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DashboardState {
    #[default]
    Loading,
    Ready(Dashboard),
    Error(String),
}

/// Fetches churn data through a [`ChurnApi`] and turns it into a dashboard.
pub struct ChurnAggregator<A> {
    api: A,
    options: AggregatorOptions,
    estimator: Box<dyn RevenueEstimator>,
}

impl<A: ChurnApi> ChurnAggregator<A> {
    pub fn new(api: A, options: AggregatorOptions) -> Self {
        Self {
            api,
            options,
            estimator: Box::new(FlatRateEstimator::default()),
        }
    }

    /// Replace the revenue estimator.
    pub fn with_estimator(mut self, estimator: impl RevenueEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch the dataset and customer records, then join and rank them.
    pub async fn fetch_and_join(&self) -> Result<Vec<ChurnCustomerView>, DataFetchError> {
        let (dataset, records) = self.fetch().await?;
        Ok(join_and_rank(&dataset, &records, self.options.top_n))
    }

    /// Summary numbers for `dataset`, using this aggregator's threshold and
    /// estimator.
    pub fn compute_summary(&self, dataset: &ChurnDataset, customer_count: usize) -> SummaryStats {
        compute_summary(
            dataset,
            customer_count,
            self.options.high_risk_threshold,
            self.estimator.as_ref(),
        )
    }

    /// Run one load. Never returns [`DashboardState::Loading`].
    pub async fn load(&self) -> DashboardState {
        match self.fetch().await {
            Ok((dataset, records)) => {
                let customer_count = dataset.len();
                let customers = join_and_rank(&dataset, &records, self.options.top_n);
                let summary = self.compute_summary(&dataset, customer_count);
                info!(
                    "Dashboard ready: {} customers, {} high risk",
                    customer_count, summary.high_risk_count
                );
                DashboardState::Ready(Dashboard {
                    customers,
                    summary,
                    customer_count,
                })
            }
            Err(e) => {
                warn!("Dashboard load failed: {}", e);
                DashboardState::Error(e.to_string())
            }
        }
    }

    /// Prediction and record for a single customer, fetched concurrently.
    ///
    /// `None` when the customer has no predictions or no record.
    pub async fn customer_profile(
        &self,
        customer_id: i64,
    ) -> Result<Option<ChurnCustomerView>, DataFetchError> {
        let (predictions, record) = futures::try_join!(
            self.api.customer_predictions(customer_id),
            self.api
                .customer_record(&self.options.table_name, customer_id),
        )?;

        Ok(match (predictions.first(), record) {
            (Some(prediction), Some(record)) => {
                Some(ChurnCustomerView::new(customer_id, prediction, &record))
            }
            _ => None,
        })
    }

    /// Dataset first, then every customer record. The lookups run as one
    /// group; the first failure drops the rest.
    async fn fetch(&self) -> Result<(ChurnDataset, Vec<CustomerRecord>), DataFetchError> {
        let table = self.options.table_name.as_str();
        let dataset = self.api.churn_dataset(table).await?;
        info!("Fetched churn data for {} customers", dataset.len());

        let records: Vec<Option<CustomerRecord>> = stream::iter(dataset.keys().copied())
            .map(|id| self.api.customer_record(table, id))
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

        let records: Vec<CustomerRecord> = records.into_iter().flatten().collect();
        debug!("Fetched {} customer records", records.len());

        Ok((dataset, records))
    }
}

/// Join predictions with records, rank by churn percentage and keep the
/// top `limit`.
///
/// Customers with no predictions or no matching record are dropped. Equal
/// percentages are ordered by ascending customer id.
pub fn join_and_rank(
    dataset: &ChurnDataset,
    records: &[CustomerRecord],
    limit: usize,
) -> Vec<ChurnCustomerView> {
    let mut by_id: HashMap<i64, &CustomerRecord> = HashMap::new();
    for record in records {
        if let Some(id) = record.id {
            by_id.entry(id).or_insert(record);
        }
    }

    let mut views: Vec<ChurnCustomerView> = dataset
        .iter()
        .filter_map(|(&customer_id, churn)| {
            let Some(prediction) = churn.predictions.first() else {
                debug!("Customer {} has no predictions, skipping", customer_id);
                return None;
            };
            let Some(record) = by_id.get(&customer_id) else {
                debug!("No customer record for {}, skipping", customer_id);
                return None;
            };
            Some(ChurnCustomerView::new(customer_id, prediction, record))
        })
        .collect();

    views.sort_by_key(|v| (Reverse(v.churn_probability), v.customer_id));
    views.truncate(limit);
    views
}

/// Count high-risk predictions and derive revenue and retention figures.
///
/// Every prediction of every customer is counted. Retention is 0 when there
/// are no customers and never drops below 0.
pub fn compute_summary(
    dataset: &ChurnDataset,
    customer_count: usize,
    threshold: f64,
    estimator: &dyn RevenueEstimator,
) -> SummaryStats {
    let high_risk_count = dataset
        .values()
        .flat_map(|c| c.predictions.iter())
        .filter(|p| p.churn_probability > threshold)
        .count();

    let at_risk_revenue_thousands = (estimator.estimate(high_risk_count) / 1000.0).round() as i64;

    let retention_rate_percent = if customer_count == 0 {
        0.0
    } else {
        let retained = customer_count.saturating_sub(high_risk_count) as f64;
        (retained / customer_count as f64 * 1000.0).round() / 10.0
    };

    SummaryStats {
        high_risk_count,
        at_risk_revenue_thousands,
        retention_rate_percent,
    }
}
