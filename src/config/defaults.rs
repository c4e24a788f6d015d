//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use std::net::SocketAddr;

// =============================================================================
// Listener Defaults
// =============================================================================

pub fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

// =============================================================================
// Store Defaults
// =============================================================================

pub fn default_max_connections() -> u32 {
    5
}

pub fn default_acquire_timeout_secs() -> u64 {
    5
}

pub fn default_connect_timeout_secs() -> u64 {
    5
}

// =============================================================================
// SMTP Defaults
// =============================================================================

pub fn default_smtp_host() -> String {
    "localhost".to_string()
}

pub fn default_smtp_timeout_secs() -> u64 {
    10
}

// =============================================================================
// Quota Defaults
// =============================================================================

/// Messages a caller may send inside one window before being refused.
pub fn default_max_messages() -> u32 {
    60
}

pub fn default_window_secs() -> u64 {
    3600
}

pub fn default_attempts_per_minute() -> u32 {
    30
}

pub fn default_attempt_burst() -> u32 {
    10
}
