//! The session store.
//!
//! One [`SessionStore`] owns the only session in the process. Every
//! transition that changes the login state or the session contents is
//! followed by a write of the public state through the persistence adapter,
//! and the refresh timer is rescheduled whenever the session is replaced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use fintrack_types::{
    BackendError, Session, SharedAuthBackend, SharedClock, SystemClock, User,
};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SessionError};
use crate::state::{AuthSnapshot, AuthState, PersistedState};
use crate::storage::SharedStorage;
use crate::timer::{SharedScheduler, TimerHandle, TimerTask, TokioScheduler};

/// Name the public state is persisted under.
pub const STORE_NAME: &str = "auth-store";

const SIGN_IN_FALLBACK: &str = "Sign-in failed";
const SIGN_UP_FALLBACK: &str = "Sign-up failed";

/// Result of a successful sign-up call.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The server returned a session; the store is now logged in.
    SignedIn,
    /// The account exists but must be confirmed by email before signing in.
    ConfirmationRequired(User),
}

struct PendingRefresh {
    generation: u64,
    handle: TimerHandle,
}

struct StoreInner {
    backend: SharedAuthBackend,
    storage: SharedStorage,
    clock: SharedClock,
    scheduler: SharedScheduler,
    state: watch::Sender<AuthSnapshot>,
    timer: Mutex<Option<PendingRefresh>>,
    generation: AtomicU64,
    /// Serializes refresh calls so a rotated refresh token is never reused.
    refresh_lock: tokio::sync::Mutex<()>,
}

/// Builder for [`SessionStore`].
pub struct SessionStoreBuilder {
    backend: SharedAuthBackend,
    storage: SharedStorage,
    clock: Option<SharedClock>,
    scheduler: Option<SharedScheduler>,
}

impl SessionStoreBuilder {
    /// Use `clock` instead of the system clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `scheduler` instead of Tokio timers.
    pub fn scheduler(mut self, scheduler: SharedScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build a logged-out, not yet hydrated store.
    pub fn build(self) -> SessionStore {
        let (state, _) = watch::channel(AuthSnapshot::default());
        SessionStore {
            inner: Arc::new(StoreInner {
                backend: self.backend,
                storage: self.storage,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                scheduler: self.scheduler.unwrap_or_else(|| Arc::new(TokioScheduler)),
                state,
                timer: Mutex::new(None),
                generation: AtomicU64::new(0),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

/// Authentication state machine with silent refresh and persistence.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("logged_in", &self.is_logged_in())
            .field("pending_refresh", &self.has_pending_refresh())
            .finish()
    }
}

impl SessionStore {
    pub fn builder(backend: SharedAuthBackend, storage: SharedStorage) -> SessionStoreBuilder {
        SessionStoreBuilder {
            backend,
            storage,
            clock: None,
            scheduler: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────

    /// Current public state.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.borrow().session().cloned()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user().cloned()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.state.borrow().is_logged_in()
    }

    /// Whether a refresh timer is currently armed.
    pub fn has_pending_refresh(&self) -> bool {
        self.inner.timer.lock().is_some()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────

    /// Sign in with email and password.
    ///
    /// On failure the store stays as it was and the error carries the
    /// server's detail message, or a generic fallback.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        let response = self
            .inner
            .backend
            .sign_in(email, password)
            .await
            .map_err(|e| auth_error(e, SIGN_IN_FALLBACK))?;

        let Some(session) = response.session else {
            warn!(user_id = %response.user.id, "Sign-in response carried no session");
            return Err(SessionError::Auth(SIGN_IN_FALLBACK.to_string()));
        };

        info!(user_id = %response.user.id, "Signed in");
        self.establish(session, response.user).await;
        Ok(())
    }

    /// Create an account, signing in immediately when the server returns a
    /// session.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<SignUpOutcome> {
        let response = self
            .inner
            .backend
            .sign_up(email, password, display_name)
            .await
            .map_err(|e| auth_error(e, SIGN_UP_FALLBACK))?;

        match response.session {
            Some(session) => {
                info!(user_id = %response.user.id, "Signed up");
                self.establish(session, response.user).await;
                Ok(SignUpOutcome::SignedIn)
            }
            None => {
                info!(user_id = %response.user.id, "Sign-up awaiting email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired(response.user))
            }
        }
    }

    /// Exchange the refresh token for a new session.
    ///
    /// Any failure is fatal: the store signs out before returning
    /// [`SessionError::Refresh`]. There is no retry.
    pub async fn refresh_token(&self) -> Result<Session> {
        self.refresh(true).await
    }

    /// Cancel the refresh timer, notify the server, and clear the session.
    ///
    /// The network call is best-effort; local state is cleared regardless.
    pub async fn sign_out(&self) {
        self.cancel_refresh();

        if let Some(session) = self.session() {
            if let Err(e) = self.inner.backend.sign_out(&session).await {
                warn!(error = %e, "Sign-out request failed, clearing local session anyway");
            }
        }

        self.inner.state.send_modify(|snapshot| {
            snapshot.state = AuthState::LoggedOut;
            snapshot.is_vip = false;
        });
        info!("Signed out");
        self.persist().await;
    }

    /// Restore persisted state and re-arm the refresh timer.
    ///
    /// A restored session whose refresh window has already opened is
    /// refreshed immediately; the error of that refresh is returned after
    /// the store has signed out. Unreadable or corrupt state is logged and
    /// treated as logged-out.
    pub async fn rehydrate(&self) -> Result<()> {
        let restored = match self.inner.storage.get(STORE_NAME).await {
            Ok(Some(blob)) => match PersistedState::from_blob(&blob) {
                Ok(persisted) => persisted.into_snapshot(),
                Err(e) => {
                    warn!(error = %e, "Persisted session state is corrupt, starting logged out");
                    AuthSnapshot::default()
                }
            },
            Ok(None) => AuthSnapshot::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session state");
                AuthSnapshot::default()
            }
        };

        let session = restored.session().cloned();
        self.inner.state.send_replace(AuthSnapshot {
            has_hydrated: true,
            ..restored
        });

        let Some(session) = session else {
            debug!("Rehydrated without a session");
            return Ok(());
        };

        let lead = session.refresh_lead_time(self.inner.clock.now_millis());
        if lead > 0 {
            debug!(lead_ms = lead, "Rehydrated session");
            self.schedule_refresh(&session);
            Ok(())
        } else {
            info!(lead_ms = lead, "Rehydrated session is due for refresh");
            self.refresh_token().await.map(|_| ())
        }
    }

    /// Access token that is safe to send.
    ///
    /// Refreshes first when the refresh window has already opened.
    pub async fn access_token(&self) -> Result<String> {
        let session = self.session().ok_or(SessionError::NotLoggedIn)?;
        if !session.needs_refresh(self.inner.clock.now_millis()) {
            return Ok(session.access_token);
        }
        self.refresh(false).await.map(|s| s.access_token)
    }

    pub async fn complete_onboarding(&self) {
        self.set_onboarding(true).await;
    }

    pub async fn reset_onboarding(&self) {
        self.set_onboarding(false).await;
    }

    async fn set_onboarding(&self, completed: bool) {
        let changed = self.inner.state.send_if_modified(|snapshot| {
            let changed = snapshot.has_completed_onboarding != completed;
            snapshot.has_completed_onboarding = completed;
            changed
        });
        if changed {
            self.persist().await;
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    async fn establish(&self, session: Session, user: User) {
        self.schedule_refresh(&session);
        self.inner.state.send_modify(|snapshot| {
            snapshot.state = AuthState::LoggedIn { session, user };
        });
        self.persist().await;
    }

    /// Refresh under the refresh lock. Unless `force`, a session that is no
    /// longer due (because a concurrent caller already refreshed) is returned
    /// as is.
    async fn refresh(&self, force: bool) -> Result<Session> {
        let _guard = self.inner.refresh_lock.lock().await;

        let current = self.session().ok_or(SessionError::NotLoggedIn)?;
        if !force && !current.needs_refresh(self.inner.clock.now_millis()) {
            return Ok(current);
        }

        debug!("Refreshing session");
        match self
            .inner
            .backend
            .refresh_session(&current.refresh_token)
            .await
        {
            Ok(session) => {
                let replaced = self.inner.state.send_if_modified(|snapshot| {
                    match &mut snapshot.state {
                        AuthState::LoggedIn { session: s, .. }
                            if s.refresh_token == current.refresh_token =>
                        {
                            *s = session.clone();
                            true
                        }
                        _ => false,
                    }
                });

                if !replaced {
                    debug!("Session changed during refresh, discarding result");
                    return self.session().ok_or(SessionError::NotLoggedIn);
                }

                info!(expires_at = session.expires_at, "Session refreshed");
                self.schedule_refresh(&session);
                self.persist().await;
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, signing out");
                if self
                    .session()
                    .is_some_and(|s| s.refresh_token == current.refresh_token)
                {
                    self.sign_out().await;
                }
                Err(SessionError::Refresh(e.to_string()))
            }
        }
    }

    /// Arm the refresh timer for `session`, replacing any pending one. No
    /// timer is armed when the refresh window is already open; the next
    /// [`access_token`](Self::access_token) call refreshes instead.
    fn schedule_refresh(&self, session: &Session) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut timer = self.inner.timer.lock();
        if let Some(previous) = timer.take() {
            previous.handle.cancel();
        }

        let lead = session.refresh_lead_time(self.inner.clock.now_millis());
        if lead <= 0 {
            debug!(lead_ms = lead, "Refresh already due, deferring to next access");
            return;
        }

        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let task: TimerTask = Box::new(move || {
            async move {
                if let Some(inner) = weak.upgrade() {
                    SessionStore { inner }.on_refresh_timer(generation).await;
                }
            }
            .boxed()
        });

        let handle = self
            .inner
            .scheduler
            .schedule_once(Duration::from_millis(lead.unsigned_abs()), task);
        *timer = Some(PendingRefresh { generation, handle });
        debug!(lead_ms = lead, "Token refresh scheduled");
    }

    fn cancel_refresh(&self) {
        if let Some(pending) = self.inner.timer.lock().take() {
            pending.handle.cancel();
            debug!("Pending token refresh cancelled");
        }
    }

    async fn on_refresh_timer(&self, generation: u64) {
        {
            let mut timer = self.inner.timer.lock();
            if timer.as_ref().map(|p| p.generation) != Some(generation) {
                trace!(generation, "Superseded refresh timer fired");
                return;
            }
            // The handle belongs to the task running this callback.
            timer.take();
        }

        if let Err(e) = self.refresh_token().await {
            debug!(error = %e, "Scheduled refresh ended the session");
        }
    }

    async fn persist(&self) {
        let persisted = PersistedState::from(&*self.inner.state.borrow());
        let result = match persisted.to_blob() {
            Ok(blob) => self.inner.storage.set(STORE_NAME, &blob).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session state");
        }
    }
}

fn auth_error(error: BackendError, fallback: &str) -> SessionError {
    warn!(error = %error, "Authentication rejected");
    SessionError::Auth(
        error
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| fallback.to_string()),
    )
}
