//! TTL arithmetic for cache entries.

use fintrack_types::duration_millis;

use crate::config::CacheConfig;

/// Validity rules derived from a [`CacheConfig`], in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    ttl_ms: i64,
    refresh_threshold_ms: i64,
}

impl TtlPolicy {
    /// Build the policy for a configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl_ms: duration_millis(config.ttl),
            refresh_threshold_ms: duration_millis(config.refresh_threshold),
        }
    }

    /// An entry is valid iff `now - timestamp < ttl`.
    pub fn is_valid(&self, timestamp: i64, now: i64) -> bool {
        now.saturating_sub(timestamp) < self.ttl_ms
    }

    /// Milliseconds of validity left. Negative once expired.
    pub fn remaining(&self, timestamp: i64, now: i64) -> i64 {
        self.ttl_ms.saturating_sub(now.saturating_sub(timestamp))
    }

    /// Whether a hit at `now` should also start a background refetch.
    pub fn wants_revalidation(&self, timestamp: i64, now: i64) -> bool {
        self.remaining(timestamp, now) < self.refresh_threshold_ms
    }

    /// The configured TTL in milliseconds.
    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }
}
