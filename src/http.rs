//! HTTP front end.
//!
//! Serves `POST /send` (form-encoded send requests) and `GET /metrics`
//! (Prometheus scraping).

use crate::error::GatewayError;
use crate::gateway::{MailGateway, SendForm};
use crate::metrics;
use crate::security::AttemptThrottle;
use crate::telemetry::spans;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Instrument;
use uuid::Uuid;

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<MailGateway>,
    throttle: Arc<AttemptThrottle>,
}

impl AppState {
    pub fn new(gateway: Arc<MailGateway>, throttle: Arc<AttemptThrottle>) -> Self {
        Self { gateway, throttle }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/send", post(send_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Handler for POST /send.
async fn send_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    form: Result<Form<SendForm>, FormRejection>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = spans::request(&request_id, &client.ip().to_string());

    async move {
        if !state.throttle.check(client.ip()) {
            metrics::record_throttled();
            return GatewayError::Throttled.into_response();
        }

        let form = match form {
            Ok(Form(form)) => form,
            Err(rejection) => {
                tracing::debug!(error = %rejection, "Rejected send request body");
                metrics::record_send_error("malformed_request");
                return GatewayError::MalformedRequest(rejection.body_text()).into_response();
            }
        };

        match state.gateway.handle(form).await {
            Ok(receipt) => (
                StatusCode::ACCEPTED,
                Json(json!({
                    "status": "sent",
                    "logged_at": receipt.logged_at,
                })),
            )
                .into_response(),
            Err(e) => e.into_response(),
        }
    }
    .instrument(span)
    .await
}

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

/// Run the HTTP server until Ctrl-C.
pub async fn run_http_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("HTTP server listening on {}", addr);
    serve(listener, state, shutdown_signal()).await
}

async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
