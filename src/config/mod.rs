//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Root config struct and loading (Config, ListenConfig)
//! - [`stores`]: Database endpoints (StoreConfig, CallerStoreConfig)
//! - [`mail`]: Outbound mail (SmtpConfig, MailConfig)
//! - [`security`]: Send quota and attempt throttling (RateLimitConfig, ThrottleConfig)
//! - [`validation`]: Startup validation collecting every error found

mod defaults;
mod mail;
mod security;
mod stores;
mod types;
pub mod validation;

pub use mail::{MailConfig, SmtpConfig, SmtpSecurity, TransportKind};
pub use security::{RateLimitConfig, ThrottleConfig};
pub use stores::{CallerDriver, CallerStoreConfig, StoreConfig};
pub use types::Config;
