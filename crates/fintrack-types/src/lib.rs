//! Shared types for the fintrack client core.
//!
//! Holds the records that cross crate boundaries (sessions, users, auth
//! responses), the [`Clock`] capability, and the [`AuthBackend`] seam the
//! session store drives. The HTTP implementation of the backend lives in
//! `fintrack-client`; the trait is defined here to keep the session store
//! free of any transport dependency.

pub mod auth;
pub mod clock;
pub mod error;

pub use auth::{
    AuthBackend, AuthResponse, REFRESH_MARGIN_MS, Session, SharedAuthBackend, User,
};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock, duration_millis};
pub use error::BackendError;
