//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::defaults::default_listen_address;
use super::mail::{MailConfig, SmtpConfig};
use super::security::{RateLimitConfig, ThrottleConfig};
use super::stores::{CallerStoreConfig, StoreConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP listen configuration.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Shared store holding the `users` table used to resolve sender addresses.
    pub email_lookup: StoreConfig,
    /// Shared store holding the central `audit_log` table.
    pub audit_log: StoreConfig,
    /// How per-request caller stores are reached.
    #[serde(default)]
    pub caller_store: CallerStoreConfig,
    /// Outbound SMTP transport.
    #[serde(default)]
    pub smtp: SmtpConfig,
    /// Envelope settings applied to every outgoing message.
    pub mail: MailConfig,
    /// Sliding-window send quota.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Per-address attempt throttle.
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address the `/send` and `/metrics` endpoints are served on.
    #[serde(default = "default_listen_address")]
    pub address: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_listen_address(),
        }
    }
}
