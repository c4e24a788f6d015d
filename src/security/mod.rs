//! Security module for mailgate.
//!
//! The send quota itself lives with the audit log (see `gateway`); this
//! module holds the in-memory front door that meters attempts per client
//! address, and the per-caller lock that keeps quota checks from
//! interleaving.

pub mod caller_lock;
pub mod throttle;

pub use caller_lock::CallerLocks;
pub use throttle::AttemptThrottle;
