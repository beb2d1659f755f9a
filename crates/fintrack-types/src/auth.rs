//! Authentication records and the backend seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::BackendError;

/// Refresh this long before literal expiry (60 seconds in milliseconds).
pub const REFRESH_MARGIN_MS: i64 = 60 * 1000;

/// Access/refresh token pair plus expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as unix seconds.
    pub expires_at: i64,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Milliseconds until the refresh should run, measured from `now_millis`.
    ///
    /// `expires_at * 1000 - now - 60000`. Zero or negative means the refresh
    /// is already due.
    pub fn refresh_lead_time(&self, now_millis: i64) -> i64 {
        self.expires_at
            .saturating_mul(1000)
            .saturating_sub(now_millis)
            .saturating_sub(REFRESH_MARGIN_MS)
    }

    /// Whether the refresh window has been reached.
    pub fn needs_refresh(&self, now_millis: i64) -> bool {
        self.refresh_lead_time(now_millis) <= 0
    }
}

/// Identity record returned alongside a session.
///
/// Lives and dies with its session. The metadata blob is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "user_metadata", alias = "metadata")]
    pub metadata: serde_json::Value,
}

impl User {
    /// Display name chosen at sign-up, if any.
    pub fn display_name(&self) -> Option<&str> {
        self.metadata.get("display_name").and_then(|v| v.as_str())
    }
}

/// Body of a successful sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    /// Absent when sign-up still awaits email confirmation.
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Remote authentication operations the session store depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync + std::fmt::Debug {
    /// `POST /auth/sign-in`.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError>;

    /// `POST /auth/sign-up`.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthResponse, BackendError>;

    /// `GET /auth/refresh-token` authorized with the refresh token.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError>;

    /// `POST /auth/sign-out`.
    async fn sign_out(&self, session: &Session) -> Result<(), BackendError>;
}

/// Shared auth backend for use across async contexts.
pub type SharedAuthBackend = Arc<dyn AuthBackend>;
