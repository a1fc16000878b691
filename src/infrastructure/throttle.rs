use super::cache::Clock;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-query-key minimum-interval gate. A call arriving before
/// `last_invoked + min_interval` is refused and the caller returns an empty
/// no-op result. This is a pressure valve against rapid repeated triggering
/// by callers, independent of caching and of the remote endpoint's own
/// limits.
pub struct QueryThrottle {
    min_interval: Duration,
    last_invoked: DashMap<String, Instant>,
    clock: Arc<dyn Clock>,
}

impl QueryThrottle {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            last_invoked: DashMap::new(),
            clock,
        }
    }

    /// Returns whether the call may proceed, recording the invocation time
    /// when it does. Refused calls leave the recorded time untouched.
    pub fn admit(&self, key: &str) -> bool {
        let now = self.clock.now();
        match self.last_invoked.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if now.duration_since(*occupied.get()) < self.min_interval {
                    tracing::debug!(key, "query throttled");
                    false
                } else {
                    occupied.insert(now);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now);
                true
            }
        }
    }
}
