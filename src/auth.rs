//! Authentication gate: whether tracking is allowed, and for whom.
//!
//! SYSTEM CONTEXT
//! ==============
//! Authentication itself happens elsewhere. The gate only records the
//! outcome of `auth/me` checks and explicit login/logout signals, and
//! reports how the authenticated identity changed so the tracker can end a
//! session that belongs to the previous user.

use crate::api::AuthUser;

/// How an auth signal changed the authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    Unchanged,
    SignedIn,
    /// A different user replaced `previous`.
    Switched { previous: String },
    /// The user identified by `previous` is gone.
    SignedOut { previous: String },
}

#[derive(Debug, Clone, Default)]
pub struct AuthGate {
    user: Option<AuthUser>,
}

impl AuthGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// Record an authenticated user.
    pub fn sign_in(&mut self, user: AuthUser) -> AuthChange {
        let change = match self.user.as_ref() {
            Some(current) if current.id == user.id => AuthChange::Unchanged,
            Some(current) => AuthChange::Switched { previous: current.id.clone() },
            None => AuthChange::SignedIn,
        };
        self.user = Some(user);
        change
    }

    /// Record that no user is authenticated.
    pub fn sign_out(&mut self) -> AuthChange {
        match self.user.take() {
            Some(previous) => AuthChange::SignedOut { previous: previous.id },
            None => AuthChange::Unchanged,
        }
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
