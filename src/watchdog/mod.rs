//! Watchdog Signalling
//!
//! Reports process liveness and upstream health to an external watchdog
//! service. Each watched name must be "kicked" before its timeout expires;
//! a "fault" marks it unhealthy immediately.
//!
//! ## Watched names
//!
//! - `<prefix>.running` - kicked by the background heartbeat
//! - `<prefix>.archiver.mdq` - kicked after a non-empty metadata query
//! - `<prefix>.archiver.dat` - kicked after a non-empty statistics query
//!
//! Signalling failures are logged and never affect request handling.

mod sink;

pub use sink::{HttpWatchdogSink, LogWatchdogSink};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Destination for watchdog signals
#[async_trait]
pub trait WatchdogSink: Send + Sync {
    /// Mark `name` healthy for the next `timeout_secs` seconds
    async fn kick(&self, name: &str, timeout_secs: u64) -> Result<(), WatchdogError>;

    /// Mark `name` unhealthy
    async fn fault(&self, name: &str, reason: &str) -> Result<(), WatchdogError>;
}

/// Configuration for watchdog signalling
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Prefix for every watched name
    pub prefix: String,
    /// How often the heartbeat kicks `<prefix>.running`
    pub heartbeat_interval_secs: u64,
    /// Timeout sent with heartbeat kicks
    pub running_timeout_secs: u64,
    /// Timeout sent with upstream kicks
    pub upstream_timeout_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            prefix: "sensorstate".to_string(),
            heartbeat_interval_secs: 60,
            running_timeout_secs: 300,
            upstream_timeout_secs: 600,
        }
    }
}

/// Upstream query whose health is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamChannel {
    Metadata,
    Statistics,
}

impl UpstreamChannel {
    fn suffix(self) -> &'static str {
        match self {
            UpstreamChannel::Metadata => "archiver.mdq",
            UpstreamChannel::Statistics => "archiver.dat",
        }
    }

    fn empty_reason(self) -> &'static str {
        match self {
            UpstreamChannel::Metadata => "no metadata results",
            UpstreamChannel::Statistics => "got zero results",
        }
    }
}

/// Sends liveness and upstream signals through a sink
pub struct Watchdog {
    sink: Arc<dyn WatchdogSink>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(sink: Arc<dyn WatchdogSink>, config: WatchdogConfig) -> Self {
        Self { sink, config }
    }

    /// A watchdog that only logs its signals
    pub fn log_only(config: WatchdogConfig) -> Self {
        Self::new(Arc::new(LogWatchdogSink), config)
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    fn name(&self, suffix: &str) -> String {
        format!("{}.{}", self.config.prefix, suffix)
    }

    /// Kick `<prefix>.running`
    pub async fn kick_running(&self) {
        let name = self.name("running");
        if let Err(e) = self.sink.kick(&name, self.config.running_timeout_secs).await {
            tracing::warn!(name = %name, error = %e, "Watchdog kick failed");
        }
    }

    /// Report the result size of an upstream query
    ///
    /// Non-empty results kick the channel; empty results fault it. The signal
    /// is sent from a spawned task so a slow sink never delays the caller.
    pub fn report_upstream(
        &self,
        channel: UpstreamChannel,
        results: usize,
    ) -> tokio::task::JoinHandle<()> {
        let sink = Arc::clone(&self.sink);
        let name = self.name(channel.suffix());
        let timeout_secs = self.config.upstream_timeout_secs;

        if results == 0 {
            tracing::warn!(name = %name, "{}", channel.empty_reason());
        }

        tokio::spawn(async move {
            let outcome = if results > 0 {
                sink.kick(&name, timeout_secs).await
            } else {
                sink.fault(&name, channel.empty_reason()).await
            };

            if let Err(e) = outcome {
                tracing::warn!(name = %name, error = %e, "Watchdog signal failed");
            }
        })
    }

    /// Start the background heartbeat task
    pub fn start_heartbeat(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            interval_secs = self.config.heartbeat_interval_secs,
            prefix = %self.config.prefix,
            "Starting watchdog heartbeat"
        );

        tokio::spawn(async move {
            let interval = std::time::Duration::from_secs(self.config.heartbeat_interval_secs.max(1));
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                self.kick_running().await;
            }
        })
    }
}

/// Errors that can occur when signalling the watchdog
#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Watchdog rejected signal {status}: {message}")]
    Rejected { status: u16, message: String },
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every signal for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        pub signals: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn signals(&self) -> Vec<String> {
            self.signals.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WatchdogSink for RecordingSink {
        async fn kick(&self, name: &str, timeout_secs: u64) -> Result<(), WatchdogError> {
            self.signals
                .lock()
                .unwrap()
                .push(format!("kick {} {}", name, timeout_secs));
            Ok(())
        }

        async fn fault(&self, name: &str, reason: &str) -> Result<(), WatchdogError> {
            self.signals
                .lock()
                .unwrap()
                .push(format!("fault {} {}", name, reason));
            Ok(())
        }
    }

    /// Sink that takes `delay` to answer every signal
    pub struct SlowSink {
        pub delay: std::time::Duration,
        pub inner: RecordingSink,
    }

    impl SlowSink {
        pub fn new(delay: std::time::Duration) -> Self {
            Self {
                delay,
                inner: RecordingSink::default(),
            }
        }
    }

    #[async_trait]
    impl WatchdogSink for SlowSink {
        async fn kick(&self, name: &str, timeout_secs: u64) -> Result<(), WatchdogError> {
            tokio::time::sleep(self.delay).await;
            self.inner.kick(name, timeout_secs).await
        }

        async fn fault(&self, name: &str, reason: &str) -> Result<(), WatchdogError> {
            tokio::time::sleep(self.delay).await;
            self.inner.fault(name, reason).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{RecordingSink, SlowSink};
    use super::*;

    #[tokio::test]
    async fn test_report_upstream() {
        let sink = Arc::new(RecordingSink::default());
        let watchdog = Watchdog::new(sink.clone(), WatchdogConfig::default());

        watchdog.report_upstream(UpstreamChannel::Metadata, 3).await.unwrap();
        watchdog.report_upstream(UpstreamChannel::Statistics, 0).await.unwrap();

        assert_eq!(
            sink.signals(),
            vec![
                "kick sensorstate.archiver.mdq 600",
                "fault sensorstate.archiver.dat got zero results",
            ]
        );
    }

    #[tokio::test]
    async fn test_kick_running() {
        let sink = Arc::new(RecordingSink::default());
        let config = WatchdogConfig {
            prefix: "site.a".to_string(),
            ..Default::default()
        };
        let watchdog = Watchdog::new(sink.clone(), config);

        watchdog.kick_running().await;

        assert_eq!(sink.signals(), vec!["kick site.a.running 300"]);
    }

    #[tokio::test]
    async fn test_heartbeat_kicks_immediately() {
        let sink = Arc::new(RecordingSink::default());
        let watchdog = Arc::new(Watchdog::new(sink.clone(), WatchdogConfig::default()));

        let handle = watchdog.start_heartbeat();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(sink.signals().first().map(String::as_str), Some("kick sensorstate.running 300"));
    }

    #[tokio::test]
    async fn test_report_upstream_does_not_wait_for_sink() {
        let sink = Arc::new(SlowSink::new(std::time::Duration::from_secs(3)));
        let watchdog = Watchdog::new(sink.clone(), WatchdogConfig::default());

        let started = std::time::Instant::now();
        let handle = watchdog.report_upstream(UpstreamChannel::Statistics, 5);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(sink.inner.signals().is_empty());

        handle.abort();
    }
}
