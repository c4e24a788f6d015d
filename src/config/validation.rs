//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{CallerDriver, Config, TransportKind};
use lettre::Address;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}.url must be a mysql:// or sqlite: URL")]
    UnsupportedStoreUrl(&'static str),
    #[error("{0}.max_connections must be at least 1")]
    EmptyPool(&'static str),
    #[error("mail.envelope_from is not a valid address: '{0}'")]
    InvalidEnvelopeFrom(String),
    #[error("smtp.host is required when smtp.transport = \"smtp\"")]
    MissingSmtpHost,
    #[error("smtp.username and smtp.password must be set together")]
    PartialSmtpCredentials,
    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroRateWindow,
    #[error("throttle.attempts_per_minute and throttle.burst must be greater than zero")]
    ZeroThrottle,
    #[error("caller_store.schema_file does not exist: {0}")]
    SchemaFileNotFound(String),
    #[error("caller_store.driver = \"sqlite\" does not check passwords; set caller_store.allow_sqlite = true for development")]
    InsecureCallerDriver,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Shared stores
    for (name, store) in [
        ("email_lookup", &config.email_lookup),
        ("audit_log", &config.audit_log),
    ] {
        if !is_supported_url(&store.url) {
            errors.push(ValidationError::UnsupportedStoreUrl(name));
        }
        if store.max_connections == 0 {
            errors.push(ValidationError::EmptyPool(name));
        }
    }

    if config.mail.envelope_from.parse::<Address>().is_err() {
        errors.push(ValidationError::InvalidEnvelopeFrom(
            config.mail.envelope_from.clone(),
        ));
    }

    // SMTP
    if config.smtp.transport == TransportKind::Smtp && config.smtp.host.trim().is_empty() {
        errors.push(ValidationError::MissingSmtpHost);
    }
    if config.smtp.username.is_some() != config.smtp.password.is_some() {
        errors.push(ValidationError::PartialSmtpCredentials);
    }

    // Quotas
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroRateWindow);
    }
    if config.throttle.attempts_per_minute == 0 || config.throttle.burst == 0 {
        errors.push(ValidationError::ZeroThrottle);
    }

    if config.caller_store.driver == CallerDriver::Sqlite && !config.caller_store.allow_sqlite {
        errors.push(ValidationError::InsecureCallerDriver);
    }

    if let Some(ref schema) = config.caller_store.schema_file
        && !Path::new(schema).exists()
    {
        errors.push(ValidationError::SchemaFileNotFound(
            schema.display().to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_supported_url(url: &str) -> bool {
    url.starts_with("mysql://") || url.starts_with("sqlite:")
}
