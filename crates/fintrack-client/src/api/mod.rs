//! API endpoint implementations.

mod auth;
mod finance;

pub use auth::AuthApi;
pub use finance::FinanceApi;
