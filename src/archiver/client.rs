//! Archiver REST API Client
//!
//! HTTP client for the archiver's query gateway. Implements both resolver
//! traits: metadata queries go to the metadata namespace, statistics queries
//! to the data namespace.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::ArchiverError;
use super::query::{MetadataQuery, StatisticsQuery};
use super::{MetadataItem, MetadataResolver, StatisticsItem, StatisticsResolver};

/// Archiver REST API client
pub struct HttpArchiver {
    client: Client,
    config: ArchiverConfig,
}

/// Configuration for the archiver client
#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    /// Base URL of the archiver gateway (e.g., "http://localhost:8079")
    pub base_url: String,
    /// Namespace holding sensor metadata
    pub metadata_namespace: String,
    /// Namespace holding sensor data
    pub data_namespace: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Maximum attempts for transport failures
    pub max_retries: u32,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8079".to_string(),
            metadata_namespace: "scratch.ns".to_string(),
            data_namespace: "ucberkeley".to_string(),
            request_timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

impl HttpArchiver {
    /// Create a new archiver client with the given configuration
    pub fn new(config: ArchiverConfig) -> Result<Self, ArchiverError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    fn query_url(&self) -> String {
        format!("{}/v1/query", self.config.base_url.trim_end_matches('/'))
    }

    /// Run one query against a namespace, retrying transport failures
    async fn query(&self, namespace: &str, query: &str) -> Result<QueryResponse, ArchiverError> {
        let url = self.query_url();
        let body = QueryRequest {
            namespace: namespace.to_string(),
            query: query.to_string(),
        };

        let attempts = self.config.max_retries.max(1);
        let mut last_error = ArchiverError::Unavailable;

        for attempt in 0..attempts {
            if attempt > 0 {
                // 1s, 4s, 9s...
                let delay = std::time::Duration::from_secs((attempt as u64).pow(2));
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = ArchiverError::from_transport(e);
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %last_error,
                        "Archiver request failed"
                    );
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(ArchiverError::ApiError {
                    status: status.as_u16(),
                    message: text,
                });
            }

            let result: QueryResponse = response.json().await.map_err(ArchiverError::Request)?;
            if let Some(error) = result.error.as_deref().filter(|e| !e.is_empty()) {
                return Err(ArchiverError::Query(error.to_string()));
            }
            return Ok(result);
        }

        Err(last_error)
    }
}

#[async_trait]
impl MetadataResolver for HttpArchiver {
    async fn resolve_entities(
        &self,
        query: &MetadataQuery,
    ) -> Result<Vec<MetadataItem>, ArchiverError> {
        let text = query.render();
        tracing::debug!(query = %text, "Issuing metadata query");

        let response = self.query(&self.config.metadata_namespace, &text).await?;
        Ok(response.metadata)
    }
}

#[async_trait]
impl StatisticsResolver for HttpArchiver {
    async fn resolve_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<StatisticsItem>, ArchiverError> {
        if query.stream_ids.is_empty() {
            return Ok(Vec::new());
        }
        if query.length_ns <= 0 {
            return Err(ArchiverError::InvalidWindow(format!(
                "window length must be positive, got {}ns",
                query.length_ns
            )));
        }

        let text = query.render();
        tracing::debug!(query = %text, streams = query.stream_ids.len(), "Issuing statistics query");

        let response = self.query(&self.config.data_namespace, &text).await?;
        Ok(response.stats)
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct QueryRequest {
    namespace: String,
    query: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    metadata: Vec<MetadataItem>,
    #[serde(default)]
    stats: Vec<StatisticsItem>,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArchiverConfig::default();
        assert_eq!(config.metadata_namespace, "scratch.ns");
        assert_eq!(config.data_namespace, "ucberkeley");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_query_url_trims_trailing_slash() {
        let archiver = HttpArchiver::new(ArchiverConfig {
            base_url: "http://archiver:8079/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(archiver.query_url(), "http://archiver:8079/v1/query");
    }

    #[test]
    fn test_parse_query_response() {
        let response: QueryResponse = serde_json::from_str(
            r#"{
                "metadata": [{"uuid": "u1", "path": "a/b/c/S1/d/e/f", "metadata": {"_name": "lux"}}],
                "stats": [{"uuid": "u1", "min": [1.0], "mean": [2.0], "max": [3.0], "count": [4]}]
            }"#,
        )
        .unwrap();

        assert_eq!(response.metadata.len(), 1);
        assert_eq!(response.stats[0], StatisticsItem::single("u1", 1.0, 2.0, 3.0, 4));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_statistics_query_skips_network() {
        // Nothing listens on this port; an empty stream list must not touch it.
        let archiver = HttpArchiver::new(ArchiverConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            max_retries: 1,
            ..Default::default()
        })
        .unwrap();

        let query = StatisticsQuery::new(Vec::<String>::new(), 0, 300);
        let stats = archiver.resolve_statistics(&query).await.unwrap();
        assert!(stats.is_empty());
    }
}
