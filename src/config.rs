//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::archiver::ArchiverConfig;
use crate::snapshot::{CacheConfig, EngineConfig, MetadataSchema, DEFAULT_PATH_PATTERN};
use crate::watchdog::WatchdogConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub archiver: ArchiverSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub watchdog: WatchdogSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Archiver connection and selector configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiverSection {
    #[serde(default = "default_archiver_url")]
    pub url: String,

    #[serde(default = "default_metadata_namespace")]
    pub metadata_namespace: String,

    #[serde(default = "default_data_namespace")]
    pub data_namespace: String,

    #[serde(default = "default_archiver_timeout")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_coordinate_attribute")]
    pub coordinate_attribute: String,

    #[serde(default = "default_name_attribute")]
    pub name_attribute: String,

    #[serde(default = "default_path_pattern")]
    pub path_pattern: String,
}

fn default_archiver_url() -> String {
    "http://localhost:8079".to_string()
}

fn default_metadata_namespace() -> String {
    "scratch.ns".to_string()
}

fn default_data_namespace() -> String {
    "ucberkeley".to_string()
}

fn default_archiver_timeout() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_coordinate_attribute() -> String {
    "rcoords".to_string()
}

fn default_name_attribute() -> String {
    "_name".to_string()
}

fn default_path_pattern() -> String {
    DEFAULT_PATH_PATTERN.to_string()
}

impl Default for ArchiverSection {
    fn default() -> Self {
        Self {
            url: default_archiver_url(),
            metadata_namespace: default_metadata_namespace(),
            data_namespace: default_data_namespace(),
            request_timeout_ms: default_archiver_timeout(),
            max_retries: default_max_retries(),
            coordinate_attribute: default_coordinate_attribute(),
            name_attribute: default_name_attribute(),
            path_pattern: default_path_pattern(),
        }
    }
}

/// Window cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(default = "default_eviction_batch")]
    pub eviction_batch: usize,

    #[serde(default = "default_settle_guard")]
    pub settle_guard_secs: u64,
}

fn default_max_entries() -> usize {
    1000
}

fn default_eviction_batch() -> usize {
    50
}

fn default_settle_guard() -> u64 {
    180 // 3 minutes
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            eviction_batch: default_eviction_batch(),
            settle_guard_secs: default_settle_guard(),
        }
    }
}

/// Watchdog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogSection {
    #[serde(default)]
    pub enabled: bool,

    pub url: Option<String>,

    #[serde(default = "default_watchdog_prefix")]
    pub prefix: String,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_running_timeout")]
    pub running_timeout_secs: u64,

    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    #[serde(default = "default_watchdog_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_watchdog_prefix() -> String {
    "sensorstate".to_string()
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_running_timeout() -> u64 {
    300
}

fn default_upstream_timeout() -> u64 {
    600
}

fn default_watchdog_request_timeout() -> u64 {
    2_000
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            prefix: default_watchdog_prefix(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            running_timeout_secs: default_running_timeout(),
            upstream_timeout_secs: default_upstream_timeout(),
            request_timeout_ms: default_watchdog_request_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Standard config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("sensorstate").join("config.toml")),
            Some(PathBuf::from("/etc/sensorstate/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Load from default locations or environment
    pub fn load_default() -> LoadOutcome {
        Self::load_first(&Self::default_paths())
    }

    /// Load the first existing file in `paths` that parses
    ///
    /// Files that exist but fail to load are skipped and reported in the
    /// outcome. Falls back to defaults with environment overrides.
    pub fn load_first(paths: &[PathBuf]) -> LoadOutcome {
        let mut failures = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return LoadOutcome {
                        config,
                        source: Some(path.clone()),
                        failures,
                    }
                }
                Err(e) => failures.push(e),
            }
        }

        LoadOutcome {
            config: Self::from_env(),
            source: None,
            failures,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // API overrides
        if let Ok(host) = std::env::var("SENSORSTATE_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("SENSORSTATE_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Archiver overrides
        if let Ok(url) = std::env::var("SENSORSTATE_ARCHIVER_URL") {
            self.archiver.url = url;
        }

        // Watchdog overrides
        if let Ok(prefix) = std::env::var("WD_PREFIX") {
            self.watchdog.prefix = prefix;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("SENSORSTATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("SENSORSTATE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Archiver client settings
    pub fn archiver_config(&self) -> ArchiverConfig {
        ArchiverConfig {
            base_url: self.archiver.url.clone(),
            metadata_namespace: self.archiver.metadata_namespace.clone(),
            data_namespace: self.archiver.data_namespace.clone(),
            request_timeout_ms: self.archiver.request_timeout_ms,
            max_retries: self.archiver.max_retries,
        }
    }

    /// Query engine settings
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let settle_guard = i64::try_from(self.cache.settle_guard_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| ConfigError::Invalid {
                field: "cache.settle_guard_secs",
                error: format!("{} is out of range", self.cache.settle_guard_secs),
            })?;

        Ok(EngineConfig {
            schema: MetadataSchema {
                coordinate_attribute: self.archiver.coordinate_attribute.clone(),
                name_attribute: self.archiver.name_attribute.clone(),
            },
            path_pattern: self.archiver.path_pattern.clone(),
            cache: CacheConfig::new()
                .with_max_entries(self.cache.max_entries)
                .with_eviction_batch(self.cache.eviction_batch)
                .with_settle_guard(settle_guard),
        })
    }

    /// Watchdog signalling settings
    pub fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            prefix: self.watchdog.prefix.clone(),
            heartbeat_interval_secs: self.watchdog.heartbeat_interval_secs,
            running_timeout_secs: self.watchdog.running_timeout_secs,
            upstream_timeout_secs: self.watchdog.upstream_timeout_secs,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {field}: {error}")]
    Invalid { field: &'static str, error: String },
}

/// Result of searching the default config locations
#[derive(Debug)]
pub struct LoadOutcome {
    /// The loaded config, or defaults with environment overrides
    pub config: Config,
    /// File the config was read from
    pub source: Option<PathBuf>,
    /// Files that exist but could not be loaded
    pub failures: Vec<ConfigError>,
}

impl LoadOutcome {
    /// Log where the config came from and every file that was skipped
    ///
    /// Call once a subscriber is installed.
    pub fn report(&self) {
        for failure in &self.failures {
            tracing::warn!(error = %failure, "Skipped config file");
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    format!(
        r#"# Sensorstate Configuration
#
# Environment variables override these settings:
# - SENSORSTATE_API_HOST
# - SENSORSTATE_API_PORT
# - SENSORSTATE_ARCHIVER_URL
# - SENSORSTATE_LOG_LEVEL
# - SENSORSTATE_LOG_FORMAT
# - WD_PREFIX

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 9999

# Request timeout in seconds
request_timeout_secs = 30

[archiver]
# Archiver query gateway URL
url = "http://localhost:8079"

# Namespace holding sensor metadata
metadata_namespace = "scratch.ns"

# Namespace holding sensor data
data_namespace = "ucberkeley"

# Request timeout (ms) and attempts for transport failures
request_timeout_ms = 30000
max_retries = 3

# Metadata attribute holding "x,y" coordinates
coordinate_attribute = "rcoords"

# Metadata attribute naming the measured quantity
name_attribute = "_name"

# Path pattern of the tracked sensors
path_pattern = "{}"

[cache]
# Maximum number of cached windows
max_entries = 1000

# Windows dropped at once when the cache is full
eviction_batch = 50

# Seconds after a window ends before it may be cached
settle_guard_secs = 180

[watchdog]
# Enable watchdog signalling
enabled = false

# Watchdog service URL
# url = "http://localhost:8090"

# Prefix for watched names
prefix = "sensorstate"

# Heartbeat interval and timeouts (seconds)
heartbeat_interval_secs = 60
running_timeout_secs = 300
upstream_timeout_secs = 600

# Timeout for each signal sent to the watchdog service (ms)
request_timeout_ms = 2000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#,
        DEFAULT_PATH_PATTERN
    )
}
