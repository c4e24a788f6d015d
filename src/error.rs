//! Unified error handling for mailgate.
//!
//! Every failure aborts the request it belongs to. Each variant carries a
//! stable code for metric labels and JSON error bodies, and maps onto an
//! HTTP status at the edge.

use crate::db::Store;
use crate::gateway::MessageField;
use crate::mail::TransportError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors that can occur while handling one send request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("could not authenticate caller")]
    Authentication,

    #[error("no {0} specified")]
    Validation(MessageField),

    #[error("could not establish {0} connection")]
    Connection(Store),

    #[error("could not find caller email address")]
    EmailResolution,

    #[error("rate limit exceeded, can send maximum of {max} in {}", describe_window(.window_secs))]
    RateLimited { max: u32, window_secs: u64 },

    #[error("could not record message in {}", join_stores(.0))]
    Persistence(Vec<Store>),

    #[error("mail transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("too many attempts, try again later")]
    Throttled,

    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

impl GatewayError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication_failed",
            Self::Validation(_) => "validation_failed",
            Self::Connection(_) => "store_unavailable",
            Self::EmailResolution => "email_unresolved",
            Self::RateLimited { .. } => "rate_limited",
            Self::Persistence(_) => "persistence_failed",
            Self::Transport(_) => "transport_failed",
            Self::Throttled => "throttled",
            Self::MalformedRequest(_) => "malformed_request",
        }
    }

    /// HTTP status reported to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Connection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmailResolution => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transport(TransportError::Recipient(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Throttled => StatusCode::TOO_MANY_REQUESTS,
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));
        (self.status_code(), body).into_response()
    }
}

/// Human form of a quota window ("1 hour", "15 minutes", "90 seconds").
fn describe_window(secs: &u64) -> String {
    let (n, unit) = match *secs {
        s if s > 0 && s % 3600 == 0 => (s / 3600, "hour"),
        s if s > 0 && s % 60 == 0 => (s / 60, "minute"),
        s => (s, "second"),
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn join_stores(stores: &[Store]) -> String {
    stores
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" and ")
}
