//! Session lifecycle state machine.
//!
//! `Anonymous -> Authenticating -> Authenticated -> (SignedOut | Expired)
//! -> Anonymous`. Events that make no sense in the current state leave it
//! unchanged.

use crate::service::auth_service::Session;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticating { email: String },
    Authenticated(Session),
    SignedOut,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoginStarted { email: String },
    LoginSucceeded(Session),
    LoginFailed,
    /// A persisted session was restored at startup.
    Restored(Session),
    SignOut,
    TokenExpired,
    /// Acknowledge a terminal state and return to `Anonymous`.
    Acknowledge,
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Applies `event` to `state`.
pub fn transition(state: SessionState, event: SessionEvent) -> SessionState {
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        (S::Anonymous | S::SignedOut | S::Expired, E::LoginStarted { email }) => {
            S::Authenticating { email }
        }
        (S::Anonymous, E::Restored(session)) => S::Authenticated(session),
        (S::Authenticating { .. }, E::LoginSucceeded(session)) => S::Authenticated(session),
        (S::Authenticating { .. }, E::LoginFailed) => S::Anonymous,
        (S::Authenticated(_), E::SignOut) => S::SignedOut,
        (S::Authenticated(_), E::TokenExpired) => S::Expired,
        (S::SignedOut | S::Expired, E::Acknowledge) => S::Anonymous,
        (state, _) => state,
    }
}
