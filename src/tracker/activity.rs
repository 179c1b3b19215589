//! User activity, page visibility, and the inactivity timeout.
//!
//! Every interaction refreshes `last_activity` and re-arms the inactivity
//! timer; when it fires the session ends. The timer keeps running while the
//! page is hidden. Heartbeats do not: hiding suspends them and showing the
//! page resumes them with an immediate beat.
//!
//! A hidden gap longer than the sleep threshold is treated as system sleep.
//! The idle gap is reset to zero instead of being carried into the session.

use std::sync::Weak;
use std::time::Duration;

use tracing::{debug, info, trace};

use super::{Shared, Tracker};

/// Kind of user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Click,
    Key,
    Scroll,
}

impl Tracker {
    /// Record a user interaction against the live session.
    pub fn record_interaction(&self, kind: Interaction) {
        let session_id = {
            let mut inner = self.lock();
            let now = self.now();
            let Some(session) = inner.live_session_mut() else {
                return;
            };
            session.touch(now);
            self.shared.store.save(&session.descriptor());
            session.session_id.clone()
        };
        trace!(?kind, "interaction");
        self.arm_inactivity_timer(&session_id);
    }

    /// Apply a page visibility change.
    pub async fn set_visibility(&self, visible: bool) {
        let now = self.now();
        let resumed = {
            let mut inner = self.lock();
            if inner.visible == visible {
                return;
            }
            inner.visible = visible;

            if !visible {
                inner.hidden_since = Some(now);
                if let Some(handle) = inner.heartbeat.take() {
                    handle.abort();
                }
                debug!("page hidden; heartbeat suspended");
                return;
            }

            let hidden_for = inner.hidden_since.take().map(|since| (now - since).max(0));
            let sleep_ms = i64::try_from(self.shared.config.sleep_threshold.as_millis()).unwrap_or(i64::MAX);
            let Some(session) = inner.live_session_mut() else {
                return;
            };
            if let Some(gap) = hidden_for.filter(|gap| *gap > sleep_ms) {
                info!(session_id = %session.session_id, hidden_ms = gap, "likely system sleep; idle gap reset");
            }
            session.touch(now);
            self.shared.store.save(&session.descriptor());
            session.session_id.clone()
        };

        debug!(session_id = %resumed, "page visible; heartbeat resumed");
        self.arm_inactivity_timer(&resumed);
        self.start_heartbeat();
        self.send_heartbeat_now().await;
    }

    /// (Re)arm the inactivity timer for `session_id`.
    pub(super) fn arm_inactivity_timer(&self, session_id: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let mut inner = self.lock();
        if let Some(handle) = inner.inactivity.take() {
            handle.abort();
        }
        inner.inactivity = Some(runtime.spawn(inactivity_timer(
            std::sync::Arc::downgrade(&self.shared),
            session_id.to_owned(),
            self.shared.config.inactivity_timeout,
        )));
    }
}

async fn inactivity_timer(shared: Weak<Shared>, session_id: String, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let tracker = Tracker { shared };
    if tracker.live_session_id().as_deref() != Some(session_id.as_str()) {
        return;
    }
    info!(%session_id, idle_secs = timeout.as_secs(), "inactivity timeout; ending session");
    // end_session aborts this task, so it runs on its own.
    tokio::spawn(async move {
        tracker.end_session().await;
    });
}

#[cfg(test)]
#[path = "activity_test.rs"]
mod tests;
