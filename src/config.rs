//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `TELEMETRY_*` environment overrides.

use crate::telem::TimeSpan;
use crate::transport::Codec;
use crate::writer::WriterConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub writer: WriterConfig,

    #[serde(default)]
    pub iterator: IteratorConfig,

    #[serde(default)]
    pub clock: ClockConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub codec: Codec,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9090
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            codec: Codec::default(),
        }
    }
}

impl ConnectionConfig {
    /// `host:port` of the target node
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Iterator defaults
#[derive(Debug, Clone, Deserialize)]
pub struct IteratorConfig {
    /// Span used when reading in fixed-size chunks (ms)
    #[serde(default = "default_chunk_span")]
    pub chunk_span_ms: u64,
}

fn default_chunk_span() -> u64 {
    1000 // 1 second
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self {
            chunk_span_ms: default_chunk_span(),
        }
    }
}

impl IteratorConfig {
    pub fn chunk_span(&self) -> TimeSpan {
        TimeSpan::from_millis(self.chunk_span_ms as i64)
    }
}

/// Clock skew check settings
#[derive(Debug, Clone, Deserialize)]
pub struct ClockConfig {
    #[serde(default = "default_skew_threshold")]
    pub skew_threshold_ms: u64,

    /// Measurements per check
    #[serde(default = "default_skew_samples")]
    pub samples: u32,
}

fn default_skew_threshold() -> u64 {
    1000
}

fn default_skew_samples() -> u32 {
    10
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            skew_threshold_ms: default_skew_threshold(),
            samples: default_skew_samples(),
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

    pub file: Option<String>,
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
            file: None,
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

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::search_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Candidate config files, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("telemetry").join("config.toml")),
            Some(PathBuf::from("/etc/telemetry/config.toml")),
            Some(PathBuf::from("./telemetry.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Connection overrides
        if let Some(host) = var("TELEMETRY_HOST") {
            self.connection.host = host;
        }
        if let Some(port) = var("TELEMETRY_PORT").and_then(|p| p.parse().ok()) {
            self.connection.port = port;
        }
        if let Some(codec) = var("TELEMETRY_CODEC").and_then(|c| Codec::parse(&c)) {
            self.connection.codec = codec;
        }

        // Writer overrides
        if let Some(bytes) = var("TELEMETRY_MAX_PAYLOAD_BYTES").and_then(|b| b.parse().ok()) {
            self.writer.max_payload_bytes = bytes;
        }
        if let Some(auto) = var("TELEMETRY_AUTO_COMMIT").and_then(|a| a.parse().ok()) {
            self.writer.auto_commit = auto;
        }

        // Clock overrides
        if let Some(ms) = var("TELEMETRY_SKEW_THRESHOLD_MS").and_then(|m| m.parse().ok()) {
            self.clock.skew_threshold_ms = ms;
        }

        // Logging overrides
        if let Some(level) = var("TELEMETRY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("TELEMETRY_LOG_FORMAT") {
            self.logging.format = format;
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
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Telemetry Client Configuration
#
# Environment variables override these settings:
# - TELEMETRY_HOST
# - TELEMETRY_PORT
# - TELEMETRY_CODEC
# - TELEMETRY_MAX_PAYLOAD_BYTES
# - TELEMETRY_AUTO_COMMIT
# - TELEMETRY_SKEW_THRESHOLD_MS
# - TELEMETRY_LOG_LEVEL
# - TELEMETRY_LOG_FORMAT

[connection]
# Cluster node to connect to
host = "localhost"
port = 9090

# Message encoding: json or msgpack
codec = "json"

[writer]
# Largest encoded frame sent in one write (bytes)
max_payload_bytes = 4194304

# Commit after every write
auto_commit = false

# Accept the first segment of a channel without a known high-water mark
allow_no_high_water_mark = true

# Accept segments starting before the previous segment's end
allow_overlap = false

# Accept segments starting after the previous segment's end
allow_gap = false

[iterator]
# Span of each chunk when reading in fixed steps (ms)
chunk_span_ms = 1000

[clock]
# Warn when the measured skew exceeds this (ms)
skew_threshold_ms = 1000

# Measurements per check
samples = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/telemetry/client.log"
"#
    .to_string()
}
