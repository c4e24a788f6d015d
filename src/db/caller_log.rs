//! Caller-owned log store.
//!
//! Each request opens its own connection with the credentials the caller
//! supplied; a successful connect is what authenticates the caller. The
//! caller can read this table, so it is a convenience copy and never used
//! for auditing.

use super::{CallerLogRecord, DbError};
use crate::config::{CallerDriver, CallerStoreConfig};
use crate::gateway::Identity;
use sqlx::{AnyConnection, Connection, Executor};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroizing;

const MYSQL_SCHEMA: &str = include_str!("../../schema/caller_log.mysql.sql");
const SQLITE_SCHEMA: &str = include_str!("../../schema/caller_log.sqlite.sql");

/// Open the caller's store with their own credentials.
pub async fn connect(
    config: &CallerStoreConfig,
    identity: &Identity,
) -> Result<AnyConnection, DbError> {
    sqlx::any::install_default_drivers();

    let url = caller_url(config, identity)?;
    let timeout = Duration::from_secs(config.connect_timeout_secs);

    let conn = match tokio::time::timeout(timeout, AnyConnection::connect(&url)).await {
        Ok(conn) => conn?,
        Err(_) => return Err(DbError::Timeout(timeout)),
    };

    debug!(caller = %identity.username, "Caller log connection opened");
    Ok(conn)
}

/// Create `mail_message_log` from the schema definition if it is missing.
pub async fn ensure_table(
    conn: &mut AnyConnection,
    config: &CallerStoreConfig,
) -> Result<(), DbError> {
    let probe = sqlx::query("SELECT id FROM mail_message_log LIMIT 1")
        .fetch_optional(&mut *conn)
        .await;
    if probe.is_ok() {
        return Ok(());
    }

    let schema = load_schema(config).await?;
    if schema.trim().is_empty() {
        warn!("Caller log schema is empty; table not created");
        return Ok(());
    }

    conn.execute(sqlx::raw_sql(&schema)).await?;
    info!("Created caller log table");
    Ok(())
}

/// Append one record.
pub async fn append(conn: &mut AnyConnection, record: &CallerLogRecord) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO mail_message_log (recipient, subject, body, log_time)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(record.recipient.clone())
    .bind(record.subject.clone())
    .bind(record.body.clone())
    .bind(record.log_time.clone())
    .execute(conn)
    .await?;

    Ok(())
}

/// Close the connection cleanly at the end of a request.
pub async fn close(conn: AnyConnection) {
    if let Err(e) = conn.close().await {
        debug!(error = %e, "Caller log connection did not close cleanly");
    }
}

/// Build the connection URL for a caller. The result holds the password and
/// is wiped on drop.
fn caller_url(
    config: &CallerStoreConfig,
    identity: &Identity,
) -> Result<Zeroizing<String>, DbError> {
    match config.driver {
        CallerDriver::Mysql => {
            let mut url = Url::parse("mysql://localhost")
                .map_err(|_| DbError::InvalidParameter("url"))?;
            if !identity.host.is_empty() {
                url.set_host(Some(&identity.host))
                    .map_err(|_| DbError::InvalidParameter("host"))?;
            }
            url.set_port(config.port)
                .map_err(|()| DbError::InvalidParameter("port"))?;
            url.set_username(&identity.username)
                .map_err(|()| DbError::InvalidParameter("username"))?;
            url.set_password(Some(&identity.password))
                .map_err(|()| DbError::InvalidParameter("password"))?;
            url.set_path(&identity.dbname);
            Ok(Zeroizing::new(String::from(url)))
        }
        CallerDriver::Sqlite => {
            // The path must not carry its own connection options.
            if identity.dbname.is_empty() || identity.dbname.contains(['?', '#']) {
                return Err(DbError::InvalidParameter("dbname"));
            }
            Ok(Zeroizing::new(format!(
                "{}://{}?mode=rw",
                config.driver.scheme(),
                identity.dbname
            )))
        }
    }
}

async fn load_schema(config: &CallerStoreConfig) -> Result<String, DbError> {
    match config.schema_file {
        Some(ref path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| DbError::Schema {
                    path: path.display().to_string(),
                    source,
                })
        }
        None => Ok(match config.driver {
            CallerDriver::Mysql => MYSQL_SCHEMA,
            CallerDriver::Sqlite => SQLITE_SCHEMA,
        }
        .to_string()),
    }
}
