//! Watchdog sinks

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{WatchdogError, WatchdogSink};

/// Posts signals to a watchdog service over HTTP
pub struct HttpWatchdogSink {
    client: Client,
    base_url: String,
}

impl HttpWatchdogSink {
    pub fn new(base_url: impl Into<String>, request_timeout_ms: u64) -> Result<Self, WatchdogError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<(), WatchdogError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.client.post(&url).json(body).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            Err(WatchdogError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl WatchdogSink for HttpWatchdogSink {
    async fn kick(&self, name: &str, timeout_secs: u64) -> Result<(), WatchdogError> {
        self.post("kick", &KickRequest { name, timeout: timeout_secs }).await
    }

    async fn fault(&self, name: &str, reason: &str) -> Result<(), WatchdogError> {
        self.post("fault", &FaultRequest { name, reason }).await
    }
}

/// Logs signals instead of sending them
pub struct LogWatchdogSink;

#[async_trait]
impl WatchdogSink for LogWatchdogSink {
    async fn kick(&self, name: &str, timeout_secs: u64) -> Result<(), WatchdogError> {
        tracing::trace!(name, timeout_secs, "watchdog kick");
        Ok(())
    }

    async fn fault(&self, name: &str, reason: &str) -> Result<(), WatchdogError> {
        tracing::debug!(name, reason, "watchdog fault");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct KickRequest<'a> {
    name: &'a str,
    timeout: u64,
}

#[derive(Debug, Serialize)]
struct FaultRequest<'a> {
    name: &'a str,
    reason: &'a str,
}
