//! Prometheus metrics collection for mailgate.
//!
//! - `mailgate_send_attempts_total` - Send requests that reached the gateway
//! - `mailgate_sends_delivered_total` - Messages logged and handed to the transport
//! - `mailgate_send_errors_total{error}` - Refused sends by error code
//! - `mailgate_rate_limited_total` - Sends refused by the quota
//! - `mailgate_throttled_total` - Attempts refused by the per-address throttle
//! - `mailgate_send_duration_seconds` - End-to-end request latency

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

pub static SEND_ATTEMPTS: OnceLock<IntCounter> = OnceLock::new();

pub static SENDS_DELIVERED: OnceLock<IntCounter> = OnceLock::new();

/// Refused sends by error code.
pub static SEND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

pub static RATE_LIMITED: OnceLock<IntCounter> = OnceLock::new();

pub static THROTTLED: OnceLock<IntCounter> = OnceLock::new();

pub static SEND_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(SEND_ATTEMPTS, IntCounter::new("mailgate_send_attempts_total", "Send requests received"));
    register!(SENDS_DELIVERED, IntCounter::new("mailgate_sends_delivered_total", "Messages logged and handed to the transport"));
    register!(SEND_ERRORS, IntCounterVec::new(Opts::new("mailgate_send_errors_total", "Refused sends by error code"), &["error"]));
    register!(RATE_LIMITED, IntCounter::new("mailgate_rate_limited_total", "Sends refused by the quota"));
    register!(THROTTLED, IntCounter::new("mailgate_throttled_total", "Attempts refused by the per-address throttle"));
    register!(SEND_LATENCY, Histogram::with_opts(
        HistogramOpts::new("mailgate_send_duration_seconds", "End-to-end send request latency")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

#[inline]
pub fn record_send_attempt() {
    inc(&SEND_ATTEMPTS);
}

#[inline]
pub fn record_delivered() {
    inc(&SENDS_DELIVERED);
}

#[inline]
pub fn record_rate_limited() {
    inc(&RATE_LIMITED);
}

#[inline]
pub fn record_throttled() {
    inc(&THROTTLED);
}

/// Record a refused send.
#[inline]
pub fn record_send_error(error: &str) {
    if let Some(c) = SEND_ERRORS.get() {
        c.with_label_values(&[error]).inc();
    }
}

/// Record end-to-end latency of one send request.
#[inline]
pub fn record_send_latency(duration_secs: f64) {
    if let Some(h) = SEND_LATENCY.get() {
        h.observe(duration_secs);
    }
}
