//! HTTP client for the churn prediction service.
//!
//! All endpoints are unauthenticated JSON GETs. Any non-2xx response is
//! reported as [`DataFetchError::HttpStatus`]; error bodies are not parsed.

use crate::models::{ChurnDataset, ChurnPrediction, Customer, CustomerRecord, OneOrMany};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Errors raised while talking to the churn backend.
#[derive(Debug, thiserror::Error)]
pub enum DataFetchError {
    #[error("Request to {url} timed out after {timeout_seconds}s")]
    Timeout { url: String, timeout_seconds: u64 },

    #[error("Cannot connect to churn service at {base_url}")]
    Connect { base_url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16, url: String },

    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, DataFetchError>;

/// Operations the dashboard needs from the churn backend.
#[async_trait]
pub trait ChurnApi: Send + Sync {
    /// `GET /Churns/?table_name={table}`
    async fn churn_dataset(&self, table: &str) -> Result<ChurnDataset>;

    /// `GET /customers/{table}/{id}/data`; `None` when the endpoint answers
    /// with an empty list.
    async fn customer_record(&self, table: &str, customer_id: i64)
        -> Result<Option<CustomerRecord>>;

    /// `GET /customers/all/{table}/`
    async fn all_customers(&self, table: &str) -> Result<Vec<Customer>>;

    /// `GET /customers_predicts/{id}`, keeping only the predictions half of
    /// the `[predictions, labels]` pair.
    async fn customer_predictions(&self, customer_id: i64) -> Result<Vec<ChurnPrediction>>;
}

/// Connection settings for [`HttpChurnClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// reqwest-backed [`ChurnApi`].
#[derive(Debug, Clone)]
pub struct HttpChurnClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl HttpChurnClient {
    pub fn new(mut config: ClientConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DataFetchError::Client(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(e, &url))?;

        let status = response.status();
        if !status.is_success() {
            warn!("GET {} returned {}", url, status);
            return Err(DataFetchError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.bytes().await.map_err(|e| self.classify(e, &url))?;
        serde_json::from_slice(&body).map_err(|e| DataFetchError::Decode {
            url,
            message: e.to_string(),
        })
    }

    fn classify(&self, err: reqwest::Error, url: &str) -> DataFetchError {
        if err.is_timeout() {
            DataFetchError::Timeout {
                url: url.to_string(),
                timeout_seconds: self.config.timeout_seconds,
            }
        } else if err.is_connect() {
            DataFetchError::Connect {
                base_url: self.config.base_url.clone(),
            }
        } else {
            DataFetchError::Network(err)
        }
    }
}

#[async_trait]
impl ChurnApi for HttpChurnClient {
    async fn churn_dataset(&self, table: &str) -> Result<ChurnDataset> {
        self.get_json("/Churns/", &[("table_name", table)]).await
    }

    async fn customer_record(
        &self,
        table: &str,
        customer_id: i64,
    ) -> Result<Option<CustomerRecord>> {
        let path = format!("/customers/{}/{}/data", table, customer_id);
        let body: OneOrMany<CustomerRecord> = self.get_json(&path, &[]).await?;
        Ok(body.into_first())
    }

    async fn all_customers(&self, table: &str) -> Result<Vec<Customer>> {
        let path = format!("/customers/all/{}/", table);
        self.get_json(&path, &[]).await
    }

    async fn customer_predictions(&self, customer_id: i64) -> Result<Vec<ChurnPrediction>> {
        let path = format!("/customers_predicts/{}", customer_id);
        let url = format!("{}{}", self.config.base_url, path);
        let body: Value = self.get_json(&path, &[]).await?;

        let predictions = match body {
            Value::Array(mut parts) if !parts.is_empty() => parts.swap_remove(0),
            other => {
                return Err(DataFetchError::Decode {
                    url,
                    message: format!("expected [predictions, labels], got {}", other),
                })
            }
        };

        serde_json::from_value(predictions).map_err(|e| DataFetchError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpChurnClient {
        HttpChurnClient::new(ClientConfig {
            base_url: format!("{}/", server.uri()),
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_churn_dataset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Churns/"))
            .and(query_param("table_name", "ecommerce"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "1": {"prediction": [{"customer_id": 1, "churn_probability": 0.87,
                                      "churn_prediction": true, "confidence": "High"}],
                      "actual": [1]}
            })))
            .mount(&server)
            .await;

        let dataset = client_for(&server).churn_dataset("ecommerce").await.unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset[&1].predictions[0].churn_probability, 0.87);
    }

    #[tokio::test]
    async fn test_customer_record_takes_first_of_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/ecommerce/7/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 7, "name": "Ann", "email": "ann@gmail.com",
                 "totalSpent": "310", "last_purchase_date": "12"},
                {"id": 8}
            ])))
            .mount(&server)
            .await;

        let record = client_for(&server)
            .customer_record("ecommerce", 7)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.id, Some(7));
        assert_eq!(record.name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn test_customer_record_single_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/ecommerce/9/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9})))
            .mount(&server)
            .await;

        let record = client_for(&server)
            .customer_record("ecommerce", 9)
            .await
            .unwrap();
        assert_eq!(record.and_then(|r| r.id), Some(9));
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Churns/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Model not loaded"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .churn_dataset("ecommerce")
            .await
            .unwrap_err();
        assert!(matches!(err, DataFetchError::HttpStatus { status: 500, .. }));
        assert_eq!(err.to_string(), "HTTP error! status: 500");
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/all/ecommerce/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .all_customers("ecommerce")
            .await
            .unwrap_err();
        assert!(matches!(err, DataFetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_customer_predictions_keeps_first_half() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers_predicts/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                [{"customer_id": 3, "churn_probability": 0.42,
                  "churn_prediction": false, "confidence": "Low"}],
                [0]
            ])))
            .mount(&server)
            .await;

        let predictions = client_for(&server).customer_predictions(3).await.unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].customer_id, 3);
        assert_eq!(predictions[0].percent(), 42);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_connect_error() {
        // Port 9 (discard) is closed on test hosts.
        let client = HttpChurnClient::new(ClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
        })
        .unwrap();

        let err = client.churn_dataset("ecommerce").await.unwrap_err();
        assert!(matches!(
            err,
            DataFetchError::Connect { .. } | DataFetchError::Network(_) | DataFetchError::Timeout { .. }
        ));
    }
}
