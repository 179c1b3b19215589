//! Login, logout, and auth checks.
//!
//! A session always belongs to the user it was started for. Signing in as
//! someone else ends the previous user's session first; signing out ends it
//! and drops everything held for that user, queued events included.

use tracing::{info, warn};

use super::Tracker;
use crate::api::AuthUser;
use crate::auth::AuthChange;
use crate::machine::{Phase, Trigger};

impl Tracker {
    /// Ask the backend who is signed in and apply the answer.
    ///
    /// Returns whether a user is authenticated afterwards. A transport
    /// failure leaves the previous state untouched.
    pub async fn refresh_auth(&self) -> bool {
        match self.shared.transport.current_user().await {
            Ok(user) => {
                self.login(user).await;
                true
            }
            Err(e) if e.is_auth() => {
                self.logout().await;
                false
            }
            Err(e) => {
                warn!(error = %e, "auth check failed; keeping previous state");
                self.is_authenticated()
            }
        }
    }

    /// Record `user` as signed in.
    pub async fn login(&self, user: AuthUser) {
        let switching = {
            let inner = self.lock();
            let gate_differs = inner.auth.user_id().is_some_and(|id| id != user.id);
            let session_differs = inner
                .session
                .as_ref()
                .and_then(|s| s.user_id.as_deref())
                .is_some_and(|id| id != user.id);
            gate_differs || session_differs
        };
        if switching {
            self.end_session().await;
        }

        let user_id = user.id.clone();
        let change = self.lock().auth.sign_in(user);
        match change {
            AuthChange::SignedIn => info!(%user_id, "signed in"),
            AuthChange::Switched { previous } => info!(%user_id, %previous, "user switched"),
            AuthChange::Unchanged | AuthChange::SignedOut { .. } => {}
        }
    }

    /// Record that no user is signed in.
    pub async fn logout(&self) {
        self.end_session().await;

        let change = {
            let mut inner = self.lock();
            let change = inner.auth.sign_out();
            if inner.phase == Phase::Starting {
                inner.advance(Trigger::Abandon);
            }
            inner.backlog.clear();
            inner.recent_joins.clear();
            self.shared.store.clear();
            change
        };
        if let AuthChange::SignedOut { previous } = change {
            info!(user_id = %previous, "signed out");
        }
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
