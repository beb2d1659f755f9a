//! Request cache with stale-while-revalidate semantics.
//!
//! This crate provides a keyed response cache for client-side data access:
//! - Fixed TTL validity window per entry
//! - Background refetch when an entry is close to expiry
//! - Single-flight de-duplication of concurrent fetches per key
//! - Stale fallback when a refetch fails after expiry
//!
//! The cache never talks to the network itself; callers supply the fetch
//! function.
//!
//! # Example
//!
//! ```rust,ignore
//! use fintrack_cache::{CacheConfig, CacheStore};
//!
//! let cache = CacheStore::new(CacheConfig::default(), clock);
//! let accounts = cache
//!     .fetch("accounts", || api.accounts(), Some(&json!({"user_id": id})))
//!     .await?;
//! ```

mod cache;
mod config;
mod coordinator;
mod error;
mod key;
mod ttl;

pub use cache::{CacheEntry, CacheStats, CacheStore, FetchOutcome, Fetched, RevalidateOutcome};
pub use config::CacheConfig;
pub use coordinator::{InFlight, RefetchCoordinator};
pub use error::{Error, Result};
pub use key::cache_key;
pub use ttl::TtlPolicy;
