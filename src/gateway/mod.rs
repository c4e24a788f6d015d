//! The mail gateway.
//!
//! A request runs strictly in sequence:
//!
//! ```text
//! authenticate → validate → open shared stores → resolve email
//!     → rate check → audit log + caller log → transport
//! ```
//!
//! [`MailGateway::begin`] covers everything up to the resolved sender and
//! returns a [`Session`] holding the request's connections and its immutable
//! [`RequestContext`]; [`Session::send`] performs the rest.

mod request;
mod session;

#[cfg(test)]
mod tests;

pub use request::{Identity, Message, MessageField, RequestContext, SendForm, validate};
pub use session::{Receipt, Session};

use crate::config::{CallerStoreConfig, Config, RateLimitConfig};
use crate::db::{SharedStores, Store, audit, caller_log, directory, log_time};
use crate::error::GatewayError;
use crate::mail::MailTransport;
use crate::metrics;
use crate::security::CallerLocks;
use crate::telemetry::SendTimer;
use chrono::{DateTime, TimeDelta, Utc};
use lettre::Address;
use lettre::address::AddressError;
use sqlx::AnyConnection;
use sqlx::pool::PoolConnection;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Authenticates callers and relays their mail.
pub struct MailGateway {
    stores: SharedStores,
    callers: CallerStoreConfig,
    rate_limit: RateLimitConfig,
    envelope_from: Address,
    transport: Arc<dyn MailTransport>,
    locks: CallerLocks,
}

/// Future returned by [`MailGateway::handle`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<Receipt, GatewayError>> + Send + 'a>>;

impl MailGateway {
    pub fn new(
        stores: SharedStores,
        config: &Config,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            stores,
            callers: config.caller_store.clone(),
            rate_limit: config.rate_limit.clone(),
            envelope_from: config.mail.envelope_from.parse()?,
            transport,
            locks: CallerLocks::new(),
        })
    }

    /// Run a whole request: begin a session and send.
    pub fn handle(&self, form: SendForm) -> SendFuture<'_> {
        Box::pin(async move {
            let _timer = SendTimer::new();
            metrics::record_send_attempt();

            let result = match self.begin(form).await {
                Ok(session) => {
                    debug!(sender = %session.context().sender, "Session opened");
                    session.send().await
                }
                Err(e) => Err(e),
            };

            report(&result);
            result
        })
    }

    /// Authenticate the caller, validate the message and resolve the
    /// caller's address.
    pub async fn begin(&self, form: SendForm) -> Result<Session<'_>, GatewayError> {
        let (identity, fields) = form.into_parts();

        let caller_log = authenticate(&identity, &self.callers).await?;
        tracing::Span::current().record("caller", identity.username.as_str());

        let message = validate(fields)?;

        let mut lookup = self.acquire(Store::EmailLookup).await?;
        let audit = self.acquire(Store::AuditLog).await?;

        let sender = resolve_email(&mut lookup, &identity.username).await?;

        let context = RequestContext {
            caller: identity.username.clone(),
            sender,
            message,
        };
        Ok(Session::new(self, context, caller_log, audit))
    }

    async fn acquire(&self, store: Store) -> Result<PoolConnection<sqlx::Any>, GatewayError> {
        self.stores.acquire(store).await.map_err(|e| {
            warn!(store = %store, error = %e, "Could not establish store connection");
            GatewayError::Connection(store)
        })
    }

    pub(crate) fn rate_limit(&self) -> &RateLimitConfig {
        &self.rate_limit
    }

    pub(crate) fn envelope_from(&self) -> &Address {
        &self.envelope_from
    }

    pub(crate) fn transport(&self) -> &dyn MailTransport {
        self.transport.as_ref()
    }

    pub(crate) fn locks(&self) -> &CallerLocks {
        &self.locks
    }
}

fn report(result: &Result<Receipt, GatewayError>) {
    match result {
        Ok(receipt) => {
            metrics::record_delivered();
            info!(logged_at = %receipt.logged_at, "Message sent");
        }
        Err(e) => {
            metrics::record_send_error(e.error_code());
            info!(error = %e, code = e.error_code(), "Send refused");
        }
    }
}

/// Open the caller's own log store with the credentials they presented.
///
/// Empty credentials are refused before any database work. A caller whose
/// store cannot be opened is not authenticated. On success the caller log
/// table is created if it does not exist yet.
pub async fn authenticate(
    identity: &Identity,
    config: &CallerStoreConfig,
) -> Result<AnyConnection, GatewayError> {
    if identity.username.is_empty() || identity.password.is_empty() {
        debug!("Missing username or password");
        return Err(GatewayError::Authentication);
    }

    let mut conn = caller_log::connect(config, identity).await.map_err(|e| {
        info!(caller = %identity.username, error = %e, "Caller authentication failed");
        GatewayError::Authentication
    })?;

    // A missing table surfaces later as a caller log write failure.
    if let Err(e) = caller_log::ensure_table(&mut conn, config).await {
        warn!(caller = %identity.username, error = %e, "Could not create caller log table");
    }

    Ok(conn)
}

/// Resolve the caller's address from the lookup store.
///
/// Succeeds only when exactly one row matches and its email is a valid
/// address.
pub async fn resolve_email(
    lookup: &mut AnyConnection,
    username: &str,
) -> Result<Address, GatewayError> {
    let rows = directory::emails_for(lookup, username)
        .await
        .map_err(|e| {
            warn!(caller = %username, error = %e, "Email lookup query failed");
            GatewayError::EmailResolution
        })?;

    match rows.as_slice() {
        [Some(email)] => email.parse::<Address>().map_err(|_| {
            debug!(caller = %username, "Stored email address is not valid");
            GatewayError::EmailResolution
        }),
        _ => {
            debug!(caller = %username, rows = rows.len(), "No unique email address");
            Err(GatewayError::EmailResolution)
        }
    }
}

/// Refuse the send when the caller already has more than the allowed number
/// of messages inside the window ending at `now`.
pub async fn check_rate_limit(
    conn: &mut AnyConnection,
    username: &str,
    now: DateTime<Utc>,
    policy: &RateLimitConfig,
) -> Result<(), GatewayError> {
    let cutoff = log_time(window_start(now, policy.window_secs));

    let sent = audit::count_since(conn, username, &cutoff)
        .await
        .map_err(|e| {
            warn!(caller = %username, error = %e, "Audit log count failed");
            GatewayError::Connection(Store::AuditLog)
        })?;

    if sent > i64::from(policy.max_messages) {
        metrics::record_rate_limited();
        info!(caller = %username, sent, max = policy.max_messages, "Rate limit exceeded");
        return Err(GatewayError::RateLimited {
            max: policy.max_messages,
            window_secs: policy.window_secs,
        });
    }

    debug!(caller = %username, sent, "Within rate limit");
    Ok(())
}

/// Start of the rate window. Windows too large to represent reach back to
/// the epoch.
fn window_start(now: DateTime<Utc>, window_secs: u64) -> DateTime<Utc> {
    i64::try_from(window_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
