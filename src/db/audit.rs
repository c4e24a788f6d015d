//! Audit log repository.
//!
//! The audit log is the caller-inaccessible record of every send and the
//! source of truth for the send quota.

use super::{AuditRecord, DbError};
use sqlx::AnyConnection;

/// Count the caller's sends logged at or after `cutoff`.
pub async fn count_since(
    conn: &mut AnyConnection,
    username: &str,
    cutoff: &str,
) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM audit_log
        WHERE username = ? AND log_time >= ?
        "#,
    )
    .bind(username.to_owned())
    .bind(cutoff.to_owned())
    .fetch_one(conn)
    .await?;

    Ok(count)
}

/// Append one record.
pub async fn append(conn: &mut AnyConnection, record: &AuditRecord) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (username, recipient, subject, body, log_time)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.username.clone())
    .bind(record.recipient.clone())
    .bind(record.subject.clone())
    .bind(record.body.clone())
    .bind(record.log_time.clone())
    .execute(conn)
    .await?;

    Ok(())
}
