//! Client error types.

use fintrack_types::BackendError;
use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a non-2xx response.
    ///
    /// `message` is the server's `detail` when it sent a string, otherwise
    /// the per-call fallback.
    #[error("{message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message to show the user.
        message: String,
        /// Server-provided `detail`, when it was a string.
        detail: Option<String>,
    },

    /// The call needs an access token and none was supplied.
    #[error("Missing access token")]
    MissingToken,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::MissingToken) || self.status() == Some(401)
    }
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        match error {
            Error::Api { status, detail, .. } => BackendError::Rejected { status, detail },
            Error::Json(e) => BackendError::InvalidResponse(e.to_string()),
            Error::Http(e) if e.is_decode() => BackendError::InvalidResponse(e.to_string()),
            other => BackendError::Network(other.to_string()),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body sent by the server.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl ErrorResponse {
    /// Build the error for a failed response body.
    pub(crate) fn into_error(body: &[u8], status: u16, fallback: &str) -> Error {
        let detail = serde_json::from_slice::<ErrorResponse>(body)
            .ok()
            .and_then(|r| match r.detail {
                serde_json::Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            });

        Error::Api {
            status,
            message: detail.clone().unwrap_or_else(|| fallback.to_string()),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_detail_is_verbatim() {
        let err = ErrorResponse::into_error(
            br#"{"detail": "Sign-in failed: Invalid login credentials"}"#,
            400,
            "Sign-in failed",
        );
        assert_eq!(err.to_string(), "Sign-in failed: Invalid login credentials");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_structured_detail_uses_fallback() {
        let err = ErrorResponse::into_error(
            br#"{"detail": [{"loc": ["body", "email"], "msg": "invalid"}]}"#,
            422,
            "Sign-up failed",
        );
        assert_eq!(err.to_string(), "Sign-up failed");
        assert!(matches!(err, Error::Api { detail: None, .. }));
    }

    #[test]
    fn test_unparseable_body_uses_fallback() {
        let err = ErrorResponse::into_error(b"<html>bad gateway</html>", 502, "Failed to fetch accounts");
        assert_eq!(err.to_string(), "Failed to fetch accounts");
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn test_into_backend_error() {
        let err = ErrorResponse::into_error(br#"{"detail": "nope"}"#, 401, "x");
        assert!(err.is_auth_error());
        assert_eq!(
            BackendError::from(err),
            BackendError::Rejected {
                status: 401,
                detail: Some("nope".to_string())
            }
        );

        assert!(matches!(
            BackendError::from(Error::MissingToken),
            BackendError::Network(_)
        ));
    }
}
