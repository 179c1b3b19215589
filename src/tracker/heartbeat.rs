//! Periodic presence heartbeats.
//!
//! One heartbeat task per live session, aborted on hide and on teardown.
//! A 401/403 answer tears the session down locally; any other failure is
//! logged and left for the next tick.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::{Shared, Tracker};

/// Result of one heartbeat attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Sent,
    /// No live session, or offline.
    Skipped,
    /// Transient failure; the next tick retries.
    Failed,
    /// The backend rejected the session and it was torn down.
    Invalidated,
}

impl Tracker {
    /// Arm the heartbeat timer for the live session, replacing any timer
    /// already armed. Returns `false` when there is no live session or no
    /// tokio runtime to run the timer on.
    pub fn start_heartbeat(&self) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime; heartbeat not armed");
            return false;
        };
        let mut inner = self.lock();
        let Some(session_id) = inner.live_session_id() else {
            return false;
        };
        if let Some(handle) = inner.heartbeat.take() {
            handle.abort();
        }
        let period = self.shared.config.heartbeat_interval;
        debug!(%session_id, period_secs = period.as_secs(), "heartbeat armed");
        inner.heartbeat = Some(runtime.spawn(heartbeat_loop(
            std::sync::Arc::downgrade(&self.shared),
            session_id,
            period,
        )));
        true
    }

    /// Disarm the heartbeat timer. Safe to call when none is armed.
    pub fn stop_heartbeat(&self) {
        if let Some(handle) = self.lock().heartbeat.take() {
            handle.abort();
            debug!("heartbeat stopped");
        }
    }

    /// Send one heartbeat for the live session.
    ///
    /// Refreshes and persists `last_activity` before sending. Called by the
    /// timer on every tick.
    pub async fn send_heartbeat(&self) -> HeartbeatOutcome {
        let snapshot = {
            let mut inner = self.lock();
            if !inner.online {
                return HeartbeatOutcome::Skipped;
            }
            let visible = inner.visible;
            let now = self.now();
            let Some(session) = inner.live_session_mut() else {
                return HeartbeatOutcome::Skipped;
            };
            session.touch(now);
            self.shared.store.save(&session.descriptor());
            session.snapshot(visible)
        };

        match self.shared.transport.heartbeat(&snapshot).await {
            Ok(()) => {
                debug!(session_id = %snapshot.session_id, "heartbeat sent");
                HeartbeatOutcome::Sent
            }
            Err(e) if e.is_auth() => {
                warn!(session_id = %snapshot.session_id, error = %e, "heartbeat rejected");
                if self.invalidate_session(&snapshot.session_id) {
                    HeartbeatOutcome::Invalidated
                } else {
                    HeartbeatOutcome::Skipped
                }
            }
            Err(e) => {
                warn!(session_id = %snapshot.session_id, error = %e, "heartbeat failed; retrying next tick");
                HeartbeatOutcome::Failed
            }
        }
    }

    /// Out-of-band heartbeat, outside the timer cadence.
    pub async fn send_heartbeat_now(&self) -> HeartbeatOutcome {
        self.send_heartbeat().await
    }
}

async fn heartbeat_loop(shared: Weak<Shared>, session_id: String, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let tracker = Tracker { shared };
        if tracker.live_session_id().as_deref() != Some(session_id.as_str()) {
            debug!(%session_id, "heartbeat timer outlived its session");
            return;
        }
        if tracker.send_heartbeat().await == HeartbeatOutcome::Invalidated {
            return;
        }
    }
}

#[cfg(test)]
#[path = "heartbeat_test.rs"]
mod tests;
