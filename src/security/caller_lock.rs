//! Per-caller serialization of quota checks.
//!
//! The send quota is a count over the audit log, so the count and the insert
//! that follows must not interleave with another send by the same caller.
//! Sends by different callers never wait on each other. This only covers
//! sends handled by this process.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One lock per caller with a send in flight.
#[derive(Default)]
pub struct CallerLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CallerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other send by `caller` holds the lock.
    pub async fn lock(&self, caller: &str) -> CallerGuard<'_> {
        // The shard guard is released before waiting.
        let lock = Arc::clone(&self.locks.entry(caller.to_string()).or_default());
        let guard = lock.lock_owned().await;
        CallerGuard {
            locks: self,
            caller: caller.to_string(),
            guard: Some(guard),
        }
    }

    /// No caller currently holds or waits for a lock.
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held while a send checks the quota and writes its log rows.
pub struct CallerGuard<'a> {
    locks: &'a CallerLocks,
    caller: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CallerGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Forget the caller once nobody else is waiting.
        self.locks
            .locks
            .remove_if(&self.caller, |_, lock| Arc::strong_count(lock) == 1);
    }
}
