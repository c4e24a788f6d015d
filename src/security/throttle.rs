//! Attempt throttling per client address.
//!
//! Every send attempt may open a database connection with caller-supplied
//! credentials, so attempts are metered per IP with `governor`'s token
//! bucket before any other work happens.

use crate::config::ThrottleConfig;
use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use tracing::debug;

/// Type alias for governor's direct rate limiter.
type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Entries kept before the map is cleared.
const MAX_ENTRIES: usize = 10_000;

/// Thread-safe per-address attempt limiter.
pub struct AttemptThrottle {
    limiters: DashMap<IpAddr, DirectRateLimiter>,
    quota: Quota,
}

impl AttemptThrottle {
    pub fn new(config: &ThrottleConfig) -> Self {
        let rate = NonZeroU32::new(config.attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        Self {
            limiters: DashMap::new(),
            quota: Quota::per_minute(rate).allow_burst(burst),
        }
    }

    /// Check if an address may make another attempt.
    ///
    /// Returns `true` if allowed, `false` if throttled.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiters.len() > MAX_ENTRIES && !self.limiters.contains_key(&ip) {
            self.limiters.clear();
            debug!("cleared attempt limiters (exceeded {} entries)", MAX_ENTRIES);
        }

        let limiter = self
            .limiters
            .entry(ip)
            .or_insert_with(|| GovRateLimiter::direct(self.quota));

        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(ip = %ip, tracked = self.tracked(), "attempt throttled");
        }
        allowed
    }

    /// Number of addresses currently tracked.
    pub fn tracked(&self) -> usize {
        self.limiters.len()
    }
}
