//! mailgated - authenticated mail relay gateway.
//!
//! Callers prove who they are by opening their own database, get their
//! sender address from a shared directory, and are held to a send quota
//! kept in a central audit log.

mod config;
mod db;
mod error;
mod gateway;
mod http;
mod mail;
mod metrics;
mod security;
mod telemetry;

use crate::config::{CallerDriver, Config};
use crate::db::SharedStores;
use crate::gateway::MailGateway;
use crate::http::AppState;
use crate::security::AttemptThrottle;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("MAILGATE_LOG_JSON").is_ok() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "mailgate.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    if config.caller_store.driver == CallerDriver::Sqlite {
        warn!("Caller stores use SQLite: passwords are not checked. Development only.");
    }

    info!(
        listen = %config.listen.address,
        caller_driver = config.caller_store.driver.scheme(),
        max_messages = config.rate_limit.max_messages,
        window_secs = config.rate_limit.window_secs,
        "Starting mailgated"
    );

    metrics::init();

    let stores = SharedStores::connect_lazy(&config.email_lookup, &config.audit_log)?;
    let transport = mail::build_transport(&config.smtp)?;
    let gateway = Arc::new(MailGateway::new(stores.clone(), &config, transport)?);
    let throttle = Arc::new(AttemptThrottle::new(&config.throttle));

    let result = http::run_http_server(config.listen.address, AppState::new(gateway, throttle)).await;

    stores.close().await;
    info!("Shutdown complete");
    result.map_err(Into::into)
}
