//! Finance API.

use fintrack_types::Session;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use crate::client::FintrackClient;
use crate::error::{Error, Result};
use crate::types::{GoalsResponse, NewAccount, NewSubscription, RowsResponse};

const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

/// Finance API client, bound to one session's tokens.
#[derive(Debug, Clone)]
pub struct FinanceApi {
    client: FintrackClient,
    access_token: String,
    refresh_token: String,
}

impl FinanceApi {
    pub(crate) fn new(client: FintrackClient, session: &Session) -> Self {
        Self {
            client,
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        }
    }

    fn authorized(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        if self.access_token.is_empty() {
            return Err(Error::MissingToken);
        }
        Ok(self
            .client
            .request(method, path)?
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(REFRESH_TOKEN_HEADER, &self.refresh_token))
    }

    /// List linked bank accounts.
    pub async fn accounts(&self) -> Result<Vec<Value>> {
        let request = self.authorized(Method::GET, "finance/")?;
        let response: Option<RowsResponse> =
            self.client.send(request, "Failed to fetch accounts").await?;
        Ok(response.unwrap_or_default().rows)
    }

    /// Register a bank account. Returns the created record, if the server
    /// sent one back.
    pub async fn add_account(&self, account: &NewAccount) -> Result<Value> {
        let request = self.authorized(Method::POST, "finance/")?.json(account);
        self.client.send(request, "Failed to add account").await
    }

    /// List the subscriptions recorded against an account.
    pub async fn subscriptions(&self, account_id: i64) -> Result<Vec<Value>> {
        let request = self.authorized(Method::GET, &format!("finance/subscriptions/{}", account_id))?;
        let response: Option<RowsResponse> = self
            .client
            .send(request, "Failed to fetch subscriptions")
            .await?;
        Ok(response.unwrap_or_default().rows)
    }

    /// Record a subscription against an account.
    pub async fn add_subscription(
        &self,
        account_id: i64,
        subscription: &NewSubscription,
    ) -> Result<Value> {
        let request = self
            .authorized(Method::POST, &format!("finance/subscriptions/{}", account_id))?
            .json(subscription);
        self.client.send(request, "Failed to add subscription").await
    }

    /// List saving goals.
    pub async fn saving_goals(&self) -> Result<Vec<Value>> {
        let request = self.authorized(Method::GET, "finance/saving-goals/")?;
        let response: Option<GoalsResponse> = self
            .client
            .send(request, "Failed to fetch saving goals")
            .await?;
        Ok(response.unwrap_or_default().goals)
    }
}
