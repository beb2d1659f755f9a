//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use fintrack_types::Session;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

use crate::api::{AuthApi, FinanceApi};
use crate::error::{Error, ErrorResponse, Result};

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default server, matching the mobile app's development setup.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Fintrack API client.
///
/// Cheap to clone; clones share the underlying connection pool.
///
/// # Example
///
/// ```no_run
/// use fintrack_client::FintrackClient;
///
/// # async fn example() -> fintrack_client::Result<()> {
/// let client = FintrackClient::builder()
///     .base_url("http://localhost:8000")
///     .build()?;
///
/// let session = client.auth().refresh_token("refresh-token").await?;
/// let goals = client.finance(&session).saving_goals().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FintrackClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl std::fmt::Debug for FintrackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FintrackClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

impl FintrackClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client pointing at the default local server.
    pub fn localhost() -> Result<Self> {
        Self::builder().base_url(DEFAULT_BASE_URL).build()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Access the authentication API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Access the finance API on behalf of `session`.
    pub fn finance(&self, session: &Session) -> FinanceApi {
        FinanceApi::new(self.clone(), session)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal HTTP methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    /// Start a request against `path`.
    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.url(path)?;
        tracing::debug!(%method, %url, "API request");
        Ok(self
            .inner
            .http
            .request(method, url)
            .timeout(self.inner.timeout))
    }

    /// Send a request and decode the body.
    ///
    /// Non-2xx responses become [`Error::Api`] with the server's string
    /// `detail`, or `fallback`. An empty 2xx body decodes as JSON `null`.
    pub(crate) async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        fallback: &str,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "API request rejected");
            return Err(ErrorResponse::into_error(&body, status.as_u16(), fallback));
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

/// Builder for creating a FintrackClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the base URL for the server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<FintrackClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("fintrack-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()?;

        Ok(FintrackClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
