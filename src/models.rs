//! Data models for the churn dashboard.
//!
//! This module contains the wire types returned by the churn backend and
//! the derived, display-ready views built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Churn probability above which a customer counts as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.8;

/// Confidence label attached to a prediction by the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single model prediction for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnPrediction {
    /// Customer the prediction belongs to.
    #[serde(default)]
    pub customer_id: i64,
    /// Estimated likelihood of churn, nominally in `[0, 1]`.
    pub churn_probability: f64,
    /// Whether the model flags the customer as churning.
    #[serde(default)]
    pub churn_prediction: bool,
    /// Model confidence label.
    #[serde(default)]
    pub confidence: Confidence,
}

impl ChurnPrediction {
    /// Probability clamped to `[0, 1]`; non-finite values count as zero.
    pub fn clamped_probability(&self) -> f64 {
        if self.churn_probability.is_finite() {
            self.churn_probability.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Probability as a whole percentage (`round(p * 100)`).
    pub fn percent(&self) -> u8 {
        (self.clamped_probability() * 100.0).round() as u8
    }
}

/// Predictions and observed labels for one customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerChurn {
    #[serde(rename = "prediction", default)]
    pub predictions: Vec<ChurnPrediction>,
    #[serde(rename = "actual", default)]
    pub actuals: Vec<i64>,
}

/// Raw `/Churns/` payload: customer id to predictions.
///
/// JSON object keys arrive as stringified integers; serde_json parses them
/// back into `i64`. A `BTreeMap` keeps iteration order stable.
pub type ChurnDataset = BTreeMap<i64, CustomerChurn>;

/// Aggregated customer data from `/customers/{table}/{id}/data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "display_string")]
    pub last_purchase_date: Option<String>,
    #[serde(rename = "totalSpent", default, deserialize_with = "display_string")]
    pub total_spent: Option<String>,
}

/// Accepts a JSON string or number and keeps it as display text.
fn display_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// The customer lookup endpoint returns either one record or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Take the single record, or the first element of the list.
    pub fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }
}

/// One raw row of `/customers/all/{table}/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "Customer ID")]
    pub customer_id: i64,
    #[serde(rename = "Customer Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "Total Purchase Amount", default)]
    pub total_purchase_amount: Option<f64>,
    #[serde(rename = "Purchase Date", default)]
    pub purchase_date: Option<String>,
    #[serde(rename = "Churn", default)]
    pub churn: Option<i64>,
    /// Remaining table columns.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Display risk bucket for a churn percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            80..=u8::MAX => RiskLevel::High,
            60..=79 => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    /// Returns an emoji representation of the risk level.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low Risk"),
            RiskLevel::Medium => write!(f, "Medium Risk"),
            RiskLevel::High => write!(f, "High Risk"),
        }
    }
}

/// Display-ready row for one at-risk customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnCustomerView {
    /// Zero-padded display identifier, e.g. `"001"`.
    pub id: String,
    pub name: String,
    pub email: String,
    /// Churn probability as a whole percentage.
    pub churn_probability: u8,
    pub last_purchase: String,
    pub total_spent: String,
    pub risk_level: RiskLevel,
    /// Numeric id used for joins and tie-breaking.
    pub customer_id: i64,
}

impl ChurnCustomerView {
    /// Build a view from a prediction and the matching record, synthesizing
    /// name and email when the record lacks them.
    pub fn new(customer_id: i64, prediction: &ChurnPrediction, record: &CustomerRecord) -> Self {
        let percent = prediction.percent();
        Self {
            id: format!("{:03}", customer_id),
            name: record
                .name
                .clone()
                .unwrap_or_else(|| format!("Customer {}", customer_id)),
            email: record
                .email
                .clone()
                .unwrap_or_else(|| format!("customer{}@email.com", customer_id)),
            churn_probability: percent,
            last_purchase: record
                .last_purchase_date
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            total_spent: record
                .total_spent
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            risk_level: RiskLevel::from_percent(percent),
            customer_id,
        }
    }
}

/// Headline numbers shown above the customer list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Predictions with probability above the high-risk threshold.
    pub high_risk_count: usize,
    /// Estimated revenue at risk, in thousands.
    pub at_risk_revenue_thousands: i64,
    /// Share of customers not at high risk, one decimal place.
    pub retention_rate_percent: f64,
}

/// Metadata about a generated dashboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Base URL of the churn backend.
    pub api_url: String,
    /// Table the predictions were computed for.
    pub table_name: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of customers present in the churn dataset.
    pub customers_analyzed: usize,
    /// Wall-clock fetch and aggregation time in seconds.
    pub duration_seconds: f64,
}

/// The complete churn dashboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub summary: SummaryStats,
    /// Highest-risk customers, most at risk first.
    pub customers: Vec<ChurnCustomerView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(p: f64) -> ChurnPrediction {
        ChurnPrediction {
            customer_id: 1,
            churn_probability: p,
            churn_prediction: p > 0.5,
            confidence: Confidence::High,
        }
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(prediction(0.873).percent(), 87);
        assert_eq!(prediction(0.875).percent(), 88);
        assert_eq!(prediction(0.0).percent(), 0);
        assert_eq!(prediction(1.0).percent(), 100);
    }

    #[test]
    fn test_percent_clamps_out_of_range() {
        assert_eq!(prediction(1.7).percent(), 100);
        assert_eq!(prediction(-0.3).percent(), 0);
        assert_eq!(prediction(f64::NAN).percent(), 0);
    }

    #[test]
    fn test_risk_level_from_percent() {
        assert_eq!(RiskLevel::from_percent(87), RiskLevel::High);
        assert_eq!(RiskLevel::from_percent(80), RiskLevel::High);
        assert_eq!(RiskLevel::from_percent(73), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_percent(59), RiskLevel::Low);
        assert_eq!(RiskLevel::High.to_string(), "High Risk");
    }

    #[test]
    fn test_parse_dataset_with_string_keys() {
        let json = r#"{
            "1": {"prediction": [{"customer_id": 1, "churn_probability": 0.87,
                                  "churn_prediction": true, "confidence": "High"}],
                  "actual": [1]},
            "12": {"prediction": [], "actual": []}
        }"#;

        let dataset: ChurnDataset = serde_json::from_str(json).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset[&1].predictions[0].churn_probability, 0.87);
        assert_eq!(dataset[&1].predictions[0].confidence, Confidence::High);
        assert_eq!(dataset[&1].actuals, vec![1]);
        assert!(dataset[&12].predictions.is_empty());
    }

    #[test]
    fn test_unknown_confidence_label() {
        let json = r#"{"churn_probability": 0.4, "confidence": "Very High"}"#;
        let p: ChurnPrediction = serde_json::from_str(json).unwrap();
        assert_eq!(p.confidence, Confidence::Unknown);
        assert!(!p.churn_prediction);
    }

    #[test]
    fn test_customer_record_numeric_total_spent() {
        let json = r#"{"id": 7, "name": "Ann", "totalSpent": 1520.5, "last_purchase_date": "12"}"#;
        let record: CustomerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, Some(7));
        assert_eq!(record.total_spent.as_deref(), Some("1520.5"));
        assert_eq!(record.last_purchase_date.as_deref(), Some("12"));
        assert_eq!(record.email, None);
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany<CustomerRecord> = serde_json::from_str(r#"{"id": 3}"#).unwrap();
        assert_eq!(one.into_first().and_then(|r| r.id), Some(3));

        let many: OneOrMany<CustomerRecord> =
            serde_json::from_str(r#"[{"id": 4}, {"id": 5}]"#).unwrap();
        assert_eq!(many.into_first().and_then(|r| r.id), Some(4));

        let empty: OneOrMany<CustomerRecord> = serde_json::from_str("[]").unwrap();
        assert!(empty.into_first().is_none());
    }

    #[test]
    fn test_view_fallbacks() {
        let record = CustomerRecord {
            id: Some(42),
            ..Default::default()
        };
        let view = ChurnCustomerView::new(42, &prediction(0.65), &record);

        assert_eq!(view.id, "042");
        assert_eq!(view.name, "Customer 42");
        assert_eq!(view.email, "customer42@email.com");
        assert_eq!(view.last_purchase, "N/A");
        assert_eq!(view.churn_probability, 65);
        assert_eq!(view.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_parse_customer_row_keeps_extra_columns() {
        let json = r#"{"Customer ID": 44605, "Customer Name": "John Rivera",
                       "Age": 31, "Gender": "Male", "Churn": 0}"#;
        let customer: Customer = serde_json::from_str(json).unwrap();
        assert_eq!(customer.customer_id, 44605);
        assert_eq!(customer.name.as_deref(), Some("John Rivera"));
        assert_eq!(customer.churn, Some(0));
        assert_eq!(customer.extra.get("Age"), Some(&Value::from(31)));
    }
}
