//! Email lookup repository.
//!
//! Maps usernames to institutional addresses via the shared `users` table.

use super::DbError;
use sqlx::AnyConnection;

/// Email column of the rows matching `username`.
///
/// At most two rows are fetched: enough to tell a unique match from an
/// ambiguous one.
pub async fn emails_for(
    conn: &mut AnyConnection,
    username: &str,
) -> Result<Vec<Option<String>>, DbError> {
    let rows = sqlx::query_scalar::<_, Option<String>>(
        r#"
        SELECT email FROM users
        WHERE username = ?
        LIMIT 2
        "#,
    )
    .bind(username.to_owned())
    .fetch_all(conn)
    .await?;

    Ok(rows)
}
