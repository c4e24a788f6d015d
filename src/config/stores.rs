//! Database endpoint configuration.

use serde::Deserialize;
use std::path::PathBuf;

use super::defaults::{
    default_acquire_timeout_secs, default_connect_timeout_secs, default_max_connections,
};

/// A shared store reached through static credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Connection URL (`mysql://...` or `sqlite://...`).
    pub url: String,
    /// Pool size (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection before the store is
    /// considered unreachable (default: 5).
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Backend used for caller-owned log stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CallerDriver {
    /// MySQL server at the caller-supplied host.
    #[default]
    Mysql,
    /// SQLite file at the caller-supplied database path. The host is ignored
    /// and the credentials are only checked for presence, so this needs
    /// `allow_sqlite`.
    Sqlite,
}

impl CallerDriver {
    /// URL scheme understood by the `Any` driver.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

/// How the per-request caller store is reached.
#[derive(Debug, Clone, Deserialize)]
pub struct CallerStoreConfig {
    #[serde(default)]
    pub driver: CallerDriver,
    /// Port for network drivers (driver default when unset).
    #[serde(default)]
    pub port: Option<u16>,
    /// Schema applied when the caller log table is missing. Falls back to the
    /// built-in definition for the driver.
    #[serde(default)]
    pub schema_file: Option<PathBuf>,
    /// Seconds allowed for the caller connection to open (default: 5).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Accept `driver = "sqlite"`. Development only: any caller naming an
    /// existing file with a non-empty password authenticates.
    #[serde(default)]
    pub allow_sqlite: bool,
}

impl Default for CallerStoreConfig {
    fn default() -> Self {
        Self {
            driver: CallerDriver::default(),
            port: None,
            schema_file: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            allow_sqlite: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_schemes() {
        assert_eq!(CallerDriver::Mysql.scheme(), "mysql");
        assert_eq!(CallerDriver::Sqlite.scheme(), "sqlite");
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let result = toml::from_str::<CallerStoreConfig>(r#"driver = "oracle""#);
        assert!(result.is_err());
    }
}
