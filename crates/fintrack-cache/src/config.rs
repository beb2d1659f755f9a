//! Configuration for the request cache.

use std::time::Duration;

/// Validity window of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Start a background refetch once an entry has less than this left.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(10);

/// Configuration for the request cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry is served after it was written.
    pub ttl: Duration,

    /// Remaining validity below which a hit also triggers a background refetch.
    pub refresh_threshold: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            refresh_threshold: DEFAULT_REFRESH_THRESHOLD,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the background refetch threshold.
    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }
}
