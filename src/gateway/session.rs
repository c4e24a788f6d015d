//! A single authenticated send.

use super::{MailGateway, RequestContext, check_rate_limit};
use crate::db::{AuditRecord, CallerLogRecord, Store, audit, caller_log, log_time};
use crate::error::GatewayError;
use crate::mail;
use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection};
use tracing::{debug, error};

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Timestamp written to both logs.
    pub logged_at: String,
}

/// An authenticated request, holding its connections until it is sent or
/// dropped.
pub struct Session<'g> {
    gateway: &'g MailGateway,
    context: RequestContext,
    caller_log: AnyConnection,
    audit: PoolConnection<Any>,
}

impl<'g> Session<'g> {
    pub(super) fn new(
        gateway: &'g MailGateway,
        context: RequestContext,
        caller_log: AnyConnection,
        audit: PoolConnection<Any>,
    ) -> Self {
        Self {
            gateway,
            context,
            caller_log,
            audit,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Rate check, log to both stores, then hand the message to the
    /// transport.
    ///
    /// The quota check and the log writes run under the caller's lock, so
    /// concurrent sends by one caller cannot all pass the same check. The two
    /// log writes are independent; both are attempted even if the first
    /// fails, and nothing is delivered unless both succeed.
    pub async fn send(self) -> Result<Receipt, GatewayError> {
        let Session {
            gateway,
            context,
            mut caller_log,
            mut audit,
        } = self;

        let quota = gateway.locks().lock(&context.caller).await;

        let now = Utc::now();
        check_rate_limit(&mut audit, &context.caller, now, gateway.rate_limit()).await?;

        let outgoing = mail::compose(&context.sender, gateway.envelope_from(), &context.message)?;

        let record = context.audit_record(log_time(now));
        let written = record_in_both(&mut audit, &mut caller_log, &record).await;
        drop(quota);
        written?;

        gateway.transport().deliver(outgoing).await?;
        caller_log::close(caller_log).await;

        Ok(Receipt {
            logged_at: record.log_time,
        })
    }
}

async fn record_in_both(
    audit_conn: &mut AnyConnection,
    caller_conn: &mut AnyConnection,
    record: &AuditRecord,
) -> Result<(), GatewayError> {
    let mut failed = Vec::new();

    if let Err(e) = audit::append(audit_conn, record).await {
        error!(caller = %record.username, error = %e, "Audit log write failed");
        failed.push(Store::AuditLog);
    }

    if let Err(e) = caller_log::append(caller_conn, &CallerLogRecord::from(record)).await {
        error!(caller = %record.username, error = %e, "Caller log write failed");
        failed.push(Store::CallerLog);
    }

    if failed.is_empty() {
        debug!(log_time = %record.log_time, "Message recorded in both logs");
        Ok(())
    } else {
        Err(GatewayError::Persistence(failed))
    }
}
