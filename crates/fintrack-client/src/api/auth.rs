//! Auth API.

use async_trait::async_trait;
use fintrack_types::{AuthBackend, AuthResponse, BackendError, Session};
use reqwest::Method;
use reqwest::header::AUTHORIZATION;

use crate::client::FintrackClient;
use crate::error::Result;
use crate::types::{SignInRequest, SignOutRequest, SignUpRequest};

/// Auth API client.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: FintrackClient,
}

impl AuthApi {
    pub(crate) fn new(client: FintrackClient) -> Self {
        Self { client }
    }

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let request = self
            .client
            .request(Method::POST, "auth/sign-in")?
            .json(&SignInRequest { email, password });
        self.client.send(request, "Sign-in failed").await
    }

    /// Create an account. The response carries no session while email
    /// confirmation is pending.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthResponse> {
        let request = self
            .client
            .request(Method::POST, "auth/sign-up")?
            .json(&SignUpRequest {
                email,
                password,
                display_name,
            });
        self.client.send(request, "Sign-up failed").await
    }

    /// Exchange a refresh token for a new session.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Session> {
        let request = self
            .client
            .request(Method::GET, "auth/refresh-token")?
            .header(AUTHORIZATION, format!("Bearer {}", refresh_token));
        self.client.send(request, "Token refresh failed").await
    }

    /// Revoke a session on the server.
    pub async fn sign_out(&self, session: &Session) -> Result<()> {
        let request = self
            .client
            .request(Method::POST, "auth/sign-out")?
            .json(&SignOutRequest {
                access_token: &session.access_token,
                refresh_token: &session.refresh_token,
            });
        self.client
            .send::<serde::de::IgnoredAny>(request, "Sign-out failed")
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl AuthBackend for AuthApi {
    async fn sign_in(&self, email: &str, password: &str) -> std::result::Result<AuthResponse, BackendError> {
        AuthApi::sign_in(self, email, password).await.map_err(BackendError::from)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> std::result::Result<AuthResponse, BackendError> {
        AuthApi::sign_up(self, email, password, display_name)
            .await
            .map_err(BackendError::from)
    }

    async fn refresh_session(&self, refresh_token: &str) -> std::result::Result<Session, BackendError> {
        self.refresh_token(refresh_token).await.map_err(BackendError::from)
    }

    async fn sign_out(&self, session: &Session) -> std::result::Result<(), BackendError> {
        AuthApi::sign_out(self, session).await.map_err(BackendError::from)
    }
}
