use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::TrackerError;

pub const DEFAULT_INFLUXDB_URL: &str = "http://localhost:8086";
pub const DEFAULT_INFLUXDB_BUCKET: &str = "visitors";
/// Placeholder salt. Operators are expected to override it; hashes made with
/// it can be reversed by anyone who knows this constant.
pub const DEFAULT_HASH_SALT: &str = "default-salt";

const ENV_PREFIX: &str = "VISITOR_TRACKER";

/// Everything the sidecar binary needs, loaded once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Backend credentials and hashing salt for the visitor tracker.
#[derive(Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "TrackerConfig::default_url")]
    pub influxdb_url: String,
    #[serde(default)]
    pub influxdb_token: String,
    #[serde(default)]
    pub influxdb_org: String,
    #[serde(default = "TrackerConfig::default_bucket")]
    pub influxdb_bucket: String,
    #[serde(default = "TrackerConfig::default_salt")]
    pub hash_salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Points per HTTP write; reaching it triggers an early flush
    #[serde(default = "WriterConfig::default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "WriterConfig::default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Capacity of the submission channel. Points beyond it are dropped.
    #[serde(default = "WriterConfig::default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "WriterConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl TrackerConfig {
    fn default_url() -> String {
        DEFAULT_INFLUXDB_URL.to_string()
    }

    fn default_bucket() -> String {
        DEFAULT_INFLUXDB_BUCKET.to_string()
    }

    fn default_salt() -> String {
        DEFAULT_HASH_SALT.to_string()
    }

    /// Config with the two required credentials set and defaults elsewhere.
    pub fn new(token: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            influxdb_token: token.into(),
            influxdb_org: org.into(),
            ..Self::default()
        }
    }

    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.hash_salt = salt.into();
        self
    }

    /// Reject configs without write credentials.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.influxdb_token.is_empty() {
            return Err(TrackerError::MissingToken);
        }
        if self.influxdb_org.is_empty() {
            return Err(TrackerError::MissingOrg);
        }
        Ok(())
    }

    pub fn uses_default_salt(&self) -> bool {
        self.hash_salt == DEFAULT_HASH_SALT
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            influxdb_url: Self::default_url(),
            influxdb_token: String::new(),
            influxdb_org: String::new(),
            influxdb_bucket: Self::default_bucket(),
            hash_salt: Self::default_salt(),
        }
    }
}

// Token and salt stay out of logs.
impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("influxdb_url", &self.influxdb_url)
            .field("influxdb_token", &redacted(&self.influxdb_token))
            .field("influxdb_org", &self.influxdb_org)
            .field("influxdb_bucket", &self.influxdb_bucket)
            .field("hash_salt", &redacted(&self.hash_salt))
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

impl WriterConfig {
    const fn default_batch_size() -> usize {
        5_000
    }

    const fn default_flush_interval_ms() -> u64 {
        1_000
    }

    const fn default_buffer_capacity() -> usize {
        10_000
    }

    const fn default_request_timeout_secs() -> u64 {
        5
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::default_batch_size(),
            flush_interval_ms: Self::default_flush_interval_ms(),
            buffer_capacity: Self::default_buffer_capacity(),
            request_timeout_secs: Self::default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    const fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file, then `VISITOR_TRACKER_*`
    /// environment variables (`.env` is honoured). Nested keys use `__`,
    /// e.g. `VISITOR_TRACKER_WRITER__BATCH_SIZE`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let settings = builder
            .build()
            .context("failed to read visitor tracker configuration")?
            .try_deserialize::<Settings>()
            .context("invalid visitor tracker configuration")?;

        Ok(settings)
    }
}
