//! Database module for the gateway's three stores.
//!
//! All stores are reached through SQLx's `Any` driver so the same queries
//! run against MySQL in production and SQLite in development:
//! - Email lookup (`users`), shared, pooled
//! - Audit log (`audit_log`), shared, pooled
//! - Caller log (`mail_message_log`), one connection per request opened with
//!   the caller's own credentials

pub mod audit;
pub mod caller_log;
pub mod directory;
mod models;

pub use models::{AuditRecord, CallerLogRecord};

use crate::config::StoreConfig;
use chrono::{DateTime, Utc};
use sqlx::pool::{PoolConnection, PoolOptions};
use sqlx::{Any, Pool};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// `log_time` column format: a MySQL `DATETIME` literal, lexically ordered.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp for the `log_time` columns.
pub fn log_time(at: DateTime<Utc>) -> String {
    at.format(LOG_TIME_FORMAT).to_string()
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid connection parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("failed to read schema file {path}: {source}")]
    Schema {
        path: String,
        source: std::io::Error,
    },
}

/// The stores a request touches, used to name failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    EmailLookup,
    AuditLog,
    CallerLog,
}

impl Store {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailLookup => "email lookup",
            Self::AuditLog => "audit log",
            Self::CallerLog => "caller log",
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pools for the statically configured stores.
///
/// Pools are created lazily: an unreachable store surfaces when a request
/// checks a connection out, not at startup.
#[derive(Clone)]
pub struct SharedStores {
    lookup: Pool<Any>,
    audit: Pool<Any>,
}

impl SharedStores {
    /// Build the lookup and audit pools.
    pub fn connect_lazy(lookup: &StoreConfig, audit: &StoreConfig) -> Result<Self, DbError> {
        sqlx::any::install_default_drivers();

        let stores = Self {
            lookup: Self::pool(lookup)?,
            audit: Self::pool(audit)?,
        };

        info!(
            lookup_connections = lookup.max_connections,
            audit_connections = audit.max_connections,
            "Shared store pools configured"
        );
        Ok(stores)
    }

    fn pool(config: &StoreConfig) -> Result<Pool<Any>, DbError> {
        let pool = PoolOptions::<Any>::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect_lazy(&config.url)?;
        Ok(pool)
    }

    /// Check a connection out of a shared store for the rest of a request.
    pub async fn acquire(&self, store: Store) -> Result<PoolConnection<Any>, DbError> {
        let pool = match store {
            Store::EmailLookup => &self.lookup,
            Store::AuditLog => &self.audit,
            Store::CallerLog => return Err(DbError::InvalidParameter("caller log is not pooled")),
        };
        Ok(pool.acquire().await?)
    }

    /// Close both pools, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.lookup.close().await;
        self.audit.close().await;
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}
