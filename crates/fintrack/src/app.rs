//! Wiring of client, session store and cache for one CLI invocation.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use fintrack_cache::{CacheConfig, CacheStore, Fetched, cache_key};
use fintrack_client::{Error as ClientError, FinanceApi, FintrackClient, NewAccount, NewSubscription};
use fintrack_config::FintrackConfig;
use fintrack_session::{FileStorage, SessionError, SessionStore};
use fintrack_types::SystemClock;
use serde_json::{Value, json};
use tracing::{debug, warn};

const ACCOUNTS: &str = "accounts";
const SUBSCRIPTIONS: &str = "subscriptions";
const SAVING_GOALS: &str = "saving-goals";

const SESSION_REJECTED: &str = "Session rejected by the server. Run 'fintrack auth sign-in' again.";

/// Everything a command needs to talk to the API.
pub struct App {
    pub client: FintrackClient,
    pub session: SessionStore,
    pub cache: CacheStore<Value>,
}

impl App {
    /// Build the client and restore the persisted session.
    ///
    /// A stored session that fails to refresh leaves the store signed out;
    /// that is reported as a warning, not an error.
    pub async fn open(config: &FintrackConfig) -> Result<Self> {
        let client = FintrackClient::builder()
            .base_url(config.api.base_url())
            .timeout(config.api.timeout())
            .build()
            .context("Invalid API configuration")?;

        let storage_dir = config.storage.effective_dir();
        debug!(dir = %storage_dir.display(), "Using session storage");

        let session =
            SessionStore::builder(Arc::new(client.auth()), Arc::new(FileStorage::new(storage_dir)))
                .build();
        if let Err(e) = session.rehydrate().await {
            warn!(error = %e, "Stored session could not be refreshed");
        }

        let cache = CacheStore::new(CacheConfig::default(), Arc::new(SystemClock));

        Ok(Self {
            client,
            session,
            cache,
        })
    }

    /// Finance API authorized with a fresh access token.
    async fn finance(&self) -> Result<FinanceApi> {
        match self.session.access_token().await {
            Ok(_) => {}
            Err(SessionError::NotLoggedIn) => {
                anyhow::bail!("Not logged in. Run 'fintrack auth sign-in' first.")
            }
            Err(e) => return Err(e.into()),
        }
        let session = self
            .session
            .session()
            .context("Session ended while refreshing")?;
        Ok(self.client.finance(&session))
    }

    pub async fn accounts(&self) -> Result<Fetched<Value>> {
        let finance = self.finance().await?;
        let fetched = self
            .cache
            .fetch_with_outcome(
                ACCOUNTS,
                move || async move { finance.accounts().await.map(Value::Array) },
                None,
            )
            .await
            .map_err(cache_error)?;
        Ok(fetched)
    }

    pub async fn add_account(&self, account: NewAccount) -> Result<Value> {
        let created = self
            .finance()
            .await?
            .add_account(&account)
            .await
            .map_err(api_error)?;
        let removed = self.cache.invalidate(Some(ACCOUNTS));
        debug!(removed, "Accounts cache invalidated");
        Ok(created)
    }

    pub async fn subscriptions(&self, account_id: i64) -> Result<Fetched<Value>> {
        let finance = self.finance().await?;
        let fetched = self
            .cache
            .fetch_with_outcome(
                SUBSCRIPTIONS,
                move || async move { finance.subscriptions(account_id).await.map(Value::Array) },
                Some(&subscriptions_params(account_id)),
            )
            .await
            .map_err(cache_error)?;
        Ok(fetched)
    }

    /// Record a subscription, then drop the cached list for that account.
    pub async fn add_subscription(
        &self,
        account_id: i64,
        subscription: NewSubscription,
    ) -> Result<Value> {
        let created = self
            .finance()
            .await?
            .add_subscription(account_id, &subscription)
            .await
            .map_err(api_error)?;

        let key = cache_key(SUBSCRIPTIONS, Some(&subscriptions_params(account_id)));
        let removed = self.cache.invalidate(Some(&key));
        debug!(key = %key, removed, "Subscription cache invalidated");
        Ok(created)
    }

    pub async fn saving_goals(&self) -> Result<Fetched<Value>> {
        let finance = self.finance().await?;
        let fetched = self
            .cache
            .fetch_with_outcome(
                SAVING_GOALS,
                move || async move { finance.saving_goals().await.map(Value::Array) },
                None,
            )
            .await
            .map_err(cache_error)?;
        Ok(fetched)
    }
}

/// A 401 from the API means the stored session is no longer accepted.
fn api_error(error: ClientError) -> anyhow::Error {
    if error.is_auth_error() {
        anyhow::Error::new(error).context(SESSION_REJECTED)
    } else {
        error.into()
    }
}

fn cache_error(error: fintrack_cache::Error) -> anyhow::Error {
    let rejected = error
        .fetch_source()
        .and_then(|source| source.downcast_ref::<ClientError>())
        .is_some_and(ClientError::is_auth_error);
    if rejected {
        anyhow::Error::new(error).context(SESSION_REJECTED)
    } else {
        error.into()
    }
}

fn subscriptions_params(account_id: i64) -> Value {
    json!({ "account_id": account_id })
}
