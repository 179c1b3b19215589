//! Session start, restore, and end.
//!
//! `start_session` runs under the async start gate, so concurrent callers
//! wait for one outcome instead of issuing parallel backend starts. The
//! phase is re-checked after every await: a logout or user switch that
//! lands while the start call is in flight wins, and the late response is
//! discarded.

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{HeartbeatOutcome, Tracker};
use crate::api::EndSessionRequest;
use crate::machine::{Phase, Trigger};
use crate::session::{Session, SessionSource};

/// Prefix marking ids generated without the backend.
pub const LOCAL_SESSION_PREFIX: &str = "local-";

fn local_session_id() -> String {
    format!("{LOCAL_SESSION_PREFIX}{}", Uuid::new_v4())
}

impl Tracker {
    /// Ensure a live session exists and return its id.
    ///
    /// Returns the current id when a session is already live. Otherwise
    /// restores a fresh stored descriptor for the same user, or asks the
    /// backend for a new id, falling back to a local id when the backend
    /// cannot be reached. Returns `None` when no user is authenticated, the
    /// backend rejects the caller, a logout overtook the start, or the first
    /// heartbeat invalidated the new session.
    pub async fn start_session(&self) -> Option<String> {
        let _gate = self.shared.start_lock.lock().await;

        let (user_id, online) = {
            let mut inner = self.lock();
            if let Some(id) = inner.live_session_id() {
                return Some(id);
            }
            let Some(user_id) = inner.auth.user_id().map(str::to_owned) else {
                debug!("start_session skipped: not authenticated");
                return None;
            };
            if !inner.advance(Trigger::Start) {
                return None;
            }
            (user_id, inner.online)
        };

        let session = match self.try_restore(&user_id) {
            Some(session) => session,
            None => match self.request_session(&user_id, online).await {
                Some(session) => session,
                None => {
                    self.lock().advance(Trigger::Abandon);
                    return None;
                }
            },
        };

        let session_id = session.session_id.clone();
        let source = session.source;
        {
            let mut inner = self.lock();
            let still_wanted =
                inner.phase == Phase::Starting && inner.auth.user_id() == Some(user_id.as_str());
            if !still_wanted {
                if inner.phase == Phase::Starting {
                    inner.advance(Trigger::Abandon);
                }
                info!(%session_id, "discarding session started for a signed-out user");
                return None;
            }
            self.shared.store.save(&session.descriptor());
            inner.session = Some(session);
            inner.advance(Trigger::Started);
        }

        info!(%session_id, user_id = %user_id, ?source, "session started");
        self.arm_inactivity_timer(&session_id);
        if self.is_visible() {
            self.start_heartbeat();
        }
        if self.send_heartbeat_now().await == HeartbeatOutcome::Invalidated {
            return None;
        }
        Some(session_id)
    }

    /// Stored descriptor for `user_id`, if one exists and is fresh enough.
    fn try_restore(&self, user_id: &str) -> Option<Session> {
        let descriptor = self.shared.store.load()?;
        let now = self.now();

        if descriptor.user_id.as_deref() != Some(user_id) {
            info!(session_id = %descriptor.session_id, "discarding stored session of another user");
            self.shared.store.clear();
            return None;
        }

        let staleness = descriptor.staleness_ms(now);
        let threshold = i64::try_from(self.shared.config.restore_threshold.as_millis()).unwrap_or(i64::MAX);
        if staleness >= threshold {
            info!(session_id = %descriptor.session_id, staleness_ms = staleness, "discarding stale stored session");
            self.shared.store.clear();
            return None;
        }

        debug!(session_id = %descriptor.session_id, staleness_ms = staleness, "restoring stored session");
        Some(Session::restore(descriptor, Some(user_id.to_owned()), now))
    }

    async fn request_session(&self, user_id: &str, online: bool) -> Option<Session> {
        if !online {
            let id = local_session_id();
            info!(session_id = %id, "offline; starting session with local id");
            return Some(Session::new(id, Some(user_id.to_owned()), self.now(), SessionSource::Local));
        }

        match self.shared.transport.start_session().await {
            Ok(resp) => Some(Session::new(
                resp.session_id,
                Some(user_id.to_owned()),
                self.now(),
                SessionSource::Server,
            )),
            Err(e) if e.is_auth() => {
                warn!(error = %e, "session start rejected");
                None
            }
            Err(e) => {
                let id = local_session_id();
                warn!(error = %e, session_id = %id, "session start failed; using local id");
                Some(Session::new(id, Some(user_id.to_owned()), self.now(), SessionSource::Local))
            }
        }
    }

    /// End the live session: stop timers, flush queued events, report the
    /// final counters, and clear stored state.
    ///
    /// Returns `false` when there was no live session to end. A second call
    /// made while an end is in flight is a no-op.
    pub async fn end_session(&self) -> bool {
        let summary = {
            let mut inner = self.lock();
            if inner.live_session().is_none() || !inner.advance(Trigger::End) {
                return false;
            }
            inner.cancel_timers();
            let now = self.now();
            let Some(session) = inner.session.as_ref() else {
                return false;
            };
            session.summary(now)
        };

        let session_id = summary.session_id.clone();
        self.flush_backlog().await;

        let request = EndSessionRequest::from(summary);
        if let Err(e) = self.shared.transport.end_session(&request).await {
            warn!(%session_id, error = %e, "session end notification failed");
        }

        {
            let mut inner = self.lock();
            inner.session = None;
            inner.hidden_since = None;
            inner.recent_joins.clear();
            inner.advance(Trigger::Ended);
            self.shared.store.clear();
        }
        info!(%session_id, duration_secs = request.duration, events = request.events, "session ended");
        true
    }

    /// Drop the session named `session_id` without telling the backend.
    /// Used when the backend reports the session or user as invalid.
    pub(super) fn invalidate_session(&self, session_id: &str) -> bool {
        let mut inner = self.lock();
        if inner.live_session_id().as_deref() != Some(session_id) || !inner.advance(Trigger::Invalidate) {
            return false;
        }
        inner.cancel_timers();
        inner.session = None;
        inner.hidden_since = None;
        inner.recent_joins.clear();
        self.shared.store.clear();
        warn!(%session_id, "session invalidated by backend");
        true
    }
}

#[cfg(test)]
#[path = "lifecycle_test.rs"]
mod tests;
