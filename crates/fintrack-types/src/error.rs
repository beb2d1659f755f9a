//! Error types shared across the fintrack crates.

use thiserror::Error;

/// Error returned by an [`AuthBackend`](crate::AuthBackend) implementation.
///
/// Kept transport-agnostic so the session store can map it onto its own
/// taxonomy without knowing about HTTP clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The server answered with a non-2xx status.
    #[error("Request rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided `detail` message, when present.
        detail: Option<String>,
    },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Server-provided detail message, if the server sent one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// HTTP status for rejected requests.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_only_for_rejections() {
        let rejected = BackendError::Rejected {
            status: 400,
            detail: Some("Invalid login credentials".to_string()),
        };
        assert_eq!(rejected.detail(), Some("Invalid login credentials"));
        assert_eq!(rejected.status(), Some(400));

        let network = BackendError::Network("connection refused".to_string());
        assert_eq!(network.detail(), None);
        assert_eq!(network.status(), None);
    }

    #[test]
    fn test_display_without_detail() {
        let err = BackendError::Rejected {
            status: 502,
            detail: None,
        };
        assert_eq!(err.to_string(), "Request rejected (502): no detail");
    }
}
