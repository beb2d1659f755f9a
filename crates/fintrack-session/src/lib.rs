//! Authenticated session lifecycle for the fintrack client.
//!
//! Owns the sign-in state machine (`LoggedOut` / `LoggedIn`), schedules the
//! silent token refresh ahead of expiry, and persists its public state so a
//! restarted process comes back in the same state.
//!
//! # Components
//!
//! - [`store`] - the [`SessionStore`] service object and its transitions
//! - [`state`] - public state snapshot and the persisted blob format
//! - [`storage`] - persistence adapters (in-memory, file-backed)
//! - [`timer`] - one-shot scheduler used for the refresh timer

pub mod error;
pub mod state;
pub mod storage;
pub mod store;
pub mod timer;

pub use error::{Result, SessionError};
pub use state::{AuthSnapshot, AuthState, PersistedState};
pub use storage::{FileStorage, MemoryStorage, PersistenceAdapter, SharedStorage};
pub use store::{STORE_NAME, SessionStore, SessionStoreBuilder, SignUpOutcome};
pub use timer::{ManualScheduler, Scheduler, SharedScheduler, TimerHandle, TimerTask, TokioScheduler};
