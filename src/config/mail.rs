//! Outbound mail configuration.

use serde::Deserialize;

use super::defaults::{default_smtp_host, default_smtp_timeout_secs};

/// Which transport hands messages off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Relay through the configured SMTP server.
    #[default]
    Smtp,
    /// Log the envelope and drop the message (development).
    Log,
}

/// Connection security towards the SMTP relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS (usually port 465).
    Tls,
    /// Plaintext upgraded with STARTTLS (usually port 587).
    #[default]
    Starttls,
    /// No encryption. Only for relays on a trusted network.
    None,
}

/// SMTP relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    /// Relay port (security-dependent default when unset).
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub security: SmtpSecurity,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            host: default_smtp_host(),
            port: None,
            security: SmtpSecurity::default(),
            username: None,
            password: None,
            timeout_secs: default_smtp_timeout_secs(),
        }
    }
}

/// Envelope settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Envelope sender; bounces go here and it becomes `Return-Path` on delivery.
    pub envelope_from: String,
}
