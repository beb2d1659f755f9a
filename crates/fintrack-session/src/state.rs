//! Public session state and its persisted form.

use fintrack_types::{Session, User};
use serde::{Deserialize, Serialize};

/// Authentication state machine.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    LoggedOut,
    LoggedIn { session: Session, user: User },
}

/// Everything the store exposes to observers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub should_create_account: bool,
    pub has_completed_onboarding: bool,
    pub is_vip: bool,
    /// Set once rehydration has finished. Never persisted.
    pub has_hydrated: bool,
}

impl AuthSnapshot {
    pub fn is_logged_in(&self) -> bool {
        matches!(self.state, AuthState::LoggedIn { .. })
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            AuthState::LoggedIn { session, .. } => Some(session),
            AuthState::LoggedOut => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            AuthState::LoggedIn { user, .. } => Some(user),
            AuthState::LoggedOut => None,
        }
    }
}

/// Persisted public state, in the mobile app's camelCase layout.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub is_logged_in: bool,
    pub user: Option<User>,
    pub session: Option<Session>,
    pub should_create_account: bool,
    pub has_completed_onboarding: bool,
    pub is_vip: bool,
}

/// Versioned envelope the blob is stored in.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

const BLOB_VERSION: u32 = 0;

impl PersistedState {
    /// Encode as the stored JSON blob.
    pub fn to_blob(&self) -> serde_json::Result<String> {
        serde_json::to_string(&Envelope {
            state: self.clone(),
            version: BLOB_VERSION,
        })
    }

    /// Decode a stored JSON blob.
    pub fn from_blob(blob: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Envelope>(blob).map(|e| e.state)
    }

    /// Rebuild the in-memory snapshot. A session is only restored together
    /// with its user.
    pub fn into_snapshot(self) -> AuthSnapshot {
        let state = match (self.session, self.user) {
            (Some(session), Some(user)) => AuthState::LoggedIn { session, user },
            _ => AuthState::LoggedOut,
        };

        AuthSnapshot {
            state,
            should_create_account: self.should_create_account,
            has_completed_onboarding: self.has_completed_onboarding,
            is_vip: self.is_vip,
            has_hydrated: false,
        }
    }
}

impl From<&AuthSnapshot> for PersistedState {
    fn from(snapshot: &AuthSnapshot) -> Self {
        Self {
            is_logged_in: snapshot.is_logged_in(),
            user: snapshot.user().cloned(),
            session: snapshot.session().cloned(),
            should_create_account: snapshot.should_create_account,
            has_completed_onboarding: snapshot.has_completed_onboarding,
            is_vip: snapshot.is_vip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u-1".to_string(),
            email: Some("a@b.c".to_string()),
            metadata: serde_json::json!({"display_name": "Ada"}),
        }
    }

    #[test]
    fn test_blob_layout() {
        let snapshot = AuthSnapshot {
            state: AuthState::LoggedIn {
                session: Session::new("a", "r", 100),
                user: user(),
            },
            has_completed_onboarding: true,
            ..Default::default()
        };

        let blob = PersistedState::from(&snapshot).to_blob().unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();

        assert_eq!(value["version"], 0);
        assert_eq!(value["state"]["isLoggedIn"], true);
        assert_eq!(value["state"]["hasCompletedOnboarding"], true);
        assert_eq!(value["state"]["session"]["refresh_token"], "r");
        assert_eq!(value["state"]["user"]["user_metadata"]["display_name"], "Ada");
    }

    #[test]
    fn test_restore_roundtrip() {
        let snapshot = AuthSnapshot {
            state: AuthState::LoggedIn {
                session: Session::new("a", "r", 100),
                user: user(),
            },
            is_vip: true,
            ..Default::default()
        };

        let blob = PersistedState::from(&snapshot).to_blob().unwrap();
        let restored = PersistedState::from_blob(&blob).unwrap().into_snapshot();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_session_without_user_is_logged_out() {
        let state = PersistedState {
            is_logged_in: true,
            session: Some(Session::new("a", "r", 100)),
            ..Default::default()
        };
        assert!(!state.into_snapshot().is_logged_in());
    }

    #[test]
    fn test_missing_fields_default() {
        let restored = PersistedState::from_blob(r#"{"state": {"hasCompletedOnboarding": true}}"#)
            .unwrap()
            .into_snapshot();
        assert!(!restored.is_logged_in());
        assert!(restored.has_completed_onboarding);
    }
}
