mod discovery;
mod duration;
mod errors;

pub use discovery::{config_home, ensure_state_dir, resolve_config_path, state_home};
pub use duration::Duration;
pub use errors::ConfigError;

use crate::instrumentation::Level;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Circuit breaker tuning, one instance shared by every per-server breaker.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CircuitBreakerConfig {
    #[serde(default)]
    pub threshold: u32,

    #[serde(default)]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CacheConfig {
    /// Total capacity across all shards, in entry size units.
    #[serde(default)]
    pub max_size: u64,
}

/// Main configuration for the resolution monitor.
///
/// Immutable after load. Unknown JSON fields are ignored; duration fields
/// accept either a humantime string ("5s", "1m") or integer nanoseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub hostnames: Vec<String>,

    #[serde(default)]
    pub dns_servers: Vec<String>,

    #[serde(default)]
    pub query_timeout: Duration,

    #[serde(default)]
    pub query_interval: Duration,

    #[serde(default = "default_health_port")]
    pub health_port: u16,

    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Empty means the XDG state directory (with a $HOME/logs fallback).
    #[serde(default)]
    pub log_dir: String,

    #[serde(default)]
    pub instrumentation_level: String,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_health_port() -> u16 {
    8880
}

fn default_metrics_port() -> u16 {
    9990
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostnames: vec!["example.com".to_string()],
            dns_servers: vec![
                "8.8.8.8:53".to_string(),
                "1.1.1.1:53".to_string(),
                "9.9.9.9:53".to_string(),
            ],
            query_timeout: Duration::from_secs(5),
            query_interval: Duration::from_secs(30),
            health_port: default_health_port(),
            metrics_port: default_metrics_port(),
            log_dir: String::new(),
            instrumentation_level: "none".to_string(),
            circuit_breaker: CircuitBreakerConfig {
                threshold: 5,
                timeout: Duration::from_secs(30),
            },
            cache: CacheConfig { max_size: 1000 },
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and normalize it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileRead(path.display().to_string(), e.to_string())
        })?;
        let mut config: Config =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Lowercase the instrumentation level and append `:53` to bare servers.
    pub fn normalize(&mut self) {
        let level = self.instrumentation_level.trim().to_lowercase();
        self.instrumentation_level = if level.is_empty() {
            "none".to_string()
        } else {
            level
        };

        for server in &mut self.dns_servers {
            if !server.contains(':') {
                server.push_str(":53");
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostnames.is_empty() {
            return Err(ConfigError::Validation(
                "at least one hostname must be specified".into(),
            ));
        }
        if self.dns_servers.is_empty() {
            return Err(ConfigError::Validation(
                "at least one DNS server must be specified".into(),
            ));
        }
        if self.query_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "query timeout must be positive".into(),
            ));
        }
        if self.query_interval.is_zero() {
            return Err(ConfigError::Validation(
                "query interval must be positive".into(),
            ));
        }
        if self.circuit_breaker.threshold == 0 {
            return Err(ConfigError::Validation(
                "circuit breaker threshold must be positive".into(),
            ));
        }
        if self.circuit_breaker.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "circuit breaker timeout must be positive".into(),
            ));
        }
        if self.cache.max_size == 0 {
            return Err(ConfigError::Validation(
                "cache max size must be positive".into(),
            ));
        }
        if self.health_port == 0 {
            return Err(ConfigError::Validation("invalid health port".into()));
        }
        if self.metrics_port == 0 {
            return Err(ConfigError::Validation("invalid metrics port".into()));
        }
        self.instrumentation_level
            .parse::<Level>()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        Ok(())
    }

    pub fn instrumentation_level(&self) -> Level {
        self.instrumentation_level.parse().unwrap_or(Level::None)
    }
}
