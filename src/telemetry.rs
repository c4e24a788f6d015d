//! Telemetry utilities for request timing and correlation.

use std::time::Instant;

/// Guard for timing a send request and recording its latency.
///
/// Records latency when dropped.
pub struct SendTimer {
    start: Instant,
}

impl SendTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for SendTimer {
    fn drop(&mut self) {
        crate::metrics::record_send_latency(self.start.elapsed().as_secs_f64());
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, field, info_span};

    /// Span for one HTTP send request. `caller` is filled in once the caller
    /// has authenticated.
    pub fn request(request_id: &str, client: &str) -> Span {
        info_span!(
            "request",
            request_id = %request_id,
            client = %client,
            caller = field::Empty
        )
    }
}
