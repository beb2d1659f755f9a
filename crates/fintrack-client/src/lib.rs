//! HTTP client for the fintrack API.
//!
//! This crate provides a typed client for the authentication and finance
//! endpoints the mobile app talks to.
//!
//! # Example
//!
//! ```no_run
//! use fintrack_client::{FintrackClient, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = FintrackClient::builder()
//!     .base_url("http://localhost:8000")
//!     .build()?;
//!
//! let signed_in = client.auth().sign_in("ada@example.com", "secret").await?;
//! if let Some(session) = signed_in.session {
//!     let accounts = client.finance(&session).accounts().await?;
//!     println!("{} accounts", accounts.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Auth**: sign-in, sign-up, token refresh, sign-out. [`AuthApi`]
//!   implements [`fintrack_types::AuthBackend`] so it plugs straight into the
//!   session store.
//! - **Finance**: accounts, subscriptions per account, saving goals

pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use api::{AuthApi, FinanceApi};
pub use client::{ClientBuilder, FintrackClient};
pub use error::{Error, Result};
pub use types::*;
