use push_core::{ActionableErrorCodes, Variant};
use push_dispatch::{ChannelConfig, MAX_TOPIC_SUBSCRIBERS};
use push_gateway::DEFAULT_FCM_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),
    #[error("Unknown variant: {0}")]
    UnknownVariant(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default = "default_max_topic_subscribers")]
    pub max_topic_subscribers: i64,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub actionable_error_codes: ActionableErrorCodes,
}

fn default_database_url() -> String {
    "push.db".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_FCM_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    ChannelConfig::default().workers
}

fn default_queue_capacity() -> usize {
    ChannelConfig::default().queue_capacity
}

fn default_max_topic_subscribers() -> i64 {
    MAX_TOPIC_SUBSCRIBERS
}

fn default_batch_size() -> i64 {
    1000 // legacy FCM multicast limit
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error. `DATABASE_URL` overrides the configured database.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)?
            }
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("push-server")
            .join("config.toml")
    }

    pub fn variant(&self, id: &str) -> Result<&Variant, ConfigError> {
        self.variants
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| ConfigError::UnknownVariant(id.to_string()))
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.timeout_secs)
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            workers: self.reconcile.workers,
            queue_capacity: self.reconcile.queue_capacity,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            actionable_error_codes: ActionableErrorCodes::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            gateway: GatewayConfig::default(),
            reconcile: ReconcileConfig::default(),
            variants: Vec::new(),
            max_topic_subscribers: default_max_topic_subscribers(),
            batch_size: default_batch_size(),
        }
    }
}
