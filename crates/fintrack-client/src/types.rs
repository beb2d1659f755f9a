//! Request and response types for the fintrack API.
//!
//! Finance records are passed through as JSON values; the server owns their
//! schema and the client only wraps the request bodies it builds itself.

use serde::{Deserialize, Serialize, Serializer};

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials for sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Credentials for sign-up.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<&'a str>,
}

/// Token pair revoked on sign-out.
#[derive(Debug, Clone, Serialize)]
pub struct SignOutRequest<'a> {
    pub access_token: &'a str,
    pub refresh_token: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Finance
// ─────────────────────────────────────────────────────────────────────────────

/// Bank account to register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub user_id: String,
    pub name: String,
    pub institution: String,
    pub currency: String,
    pub kind: String,
}

/// Recurring payment to record against an account.
///
/// `amount_minor` and `every_n` travel as strings so large integers survive
/// JSON number handling on the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSubscription {
    pub merchant: String,
    #[serde(serialize_with = "as_string")]
    pub amount_minor: i64,
    pub currency: String,
    /// ISO date the subscription starts.
    pub start_date: String,
    /// Recurrence unit, e.g. `month`.
    pub unit: String,
    #[serde(serialize_with = "as_string")]
    pub every_n: u32,
    pub active: bool,
    pub auto_detected: bool,
}

fn as_string<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

/// `{ "rows": [...] }` envelope of the finance list endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RowsResponse {
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
}

/// `{ "goals": [...] }` envelope of the saving-goals endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GoalsResponse {
    #[serde(default)]
    pub goals: Vec<serde_json::Value>,
}
