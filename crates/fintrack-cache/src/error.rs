//! Error types for cache operations.

use std::error::Error as StdError;
use std::sync::Arc;

/// Error type for cache operations.
///
/// Cloneable so that every caller joined on one in-flight fetch observes the
/// identical result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The caller-supplied fetch function failed and no stale entry existed.
    #[error("Fetch failed for {key}: {source}")]
    Fetch {
        /// Cache key of the failed request.
        key: String,
        /// The error produced by the fetch function.
        source: Arc<dyn StdError + Send + Sync>,
    },

    /// The fetch task ended without producing a value (panic or abort).
    #[error("Fetch task for {key} did not complete: {reason}")]
    Aborted { key: String, reason: String },
}

impl Error {
    /// The error returned by the fetch function, if that is what failed.
    pub fn fetch_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Error::Fetch { source, .. } => Some(source.as_ref()),
            Error::Aborted { .. } => None,
        }
    }

    /// Cache key of the request that failed.
    pub fn key(&self) -> &str {
        match self {
            Error::Fetch { key, .. } | Error::Aborted { key, .. } => key,
        }
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
