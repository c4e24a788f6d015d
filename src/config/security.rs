//! Send quota and attempt throttling configuration.

use serde::Deserialize;

use super::defaults::{
    default_attempt_burst, default_attempts_per_minute, default_max_messages,
    default_window_secs,
};

/// Sliding-window send quota enforced against the audit log.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// A send is refused once the caller has more than this many messages
    /// inside the window (default: 60).
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    /// Window length in seconds (default: 3600).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            window_secs: default_window_secs(),
        }
    }
}

/// Token bucket applied per client address before any database work.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Sustained attempts per minute (default: 30).
    #[serde(default = "default_attempts_per_minute")]
    pub attempts_per_minute: u32,
    /// Attempts allowed in a burst (default: 10).
    #[serde(default = "default_attempt_burst")]
    pub burst: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            attempts_per_minute: default_attempts_per_minute(),
            burst: default_attempt_burst(),
        }
    }
}
