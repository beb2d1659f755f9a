//! Error types for the session store.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by the session store.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// Sign-in or sign-up rejected. Carries the server's detail verbatim, or
    /// a generic fallback.
    #[error("{0}")]
    Auth(String),

    /// Token refresh failed; the store has already signed out.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// The operation needs a session and there is none.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The persistence backend failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Persisted state could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Serialization(e.to_string())
    }
}
