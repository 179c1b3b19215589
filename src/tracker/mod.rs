//! Session tracker: lifecycle, heartbeats, presence, and event delivery.
//!
//! ARCHITECTURE
//! ============
//! `Tracker` is a cheap `Clone` handle over one `Shared` block. The
//! composition root builds exactly one and hands clones to whatever emits
//! navigation and interaction signals. All mutable state sits in `Inner`
//! behind a std mutex that is never held across an await; network calls
//! and timer sleeps happen with the lock released.
//!
//! TIMERS
//! ======
//! The heartbeat interval and the inactivity timeout are tokio tasks holding
//! a `Weak<Shared>`. Each captures the session id it was armed for and exits
//! as soon as that id is no longer the live session, so a timer armed before
//! a session was replaced can never act on its successor. Both are aborted
//! whenever a session ends or is torn down.
//!
//! ERROR HANDLING
//! ==============
//! Public operations never return errors. Failures are classified where the
//! call is made (buffer, retry next tick, tear down) and logged.

mod activity;
mod delivery;
mod heartbeat;
mod identity;
mod lifecycle;
mod presence;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

pub use activity::Interaction;
pub use delivery::TrackOutcome;
pub use heartbeat::HeartbeatOutcome;

use crate::api::Transport;
use crate::auth::AuthGate;
use crate::backlog::Backlog;
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::machine::{Phase, Trigger, transition};
use crate::session::{Session, SessionInfo};
use crate::storage::{KeyValueStore, SessionStore};

/// Inbound signals from the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Out-of-band heartbeat request.
    Tick,
    Interaction(Interaction),
    /// Page visibility changed; `true` means visible.
    Visibility(bool),
    /// Connectivity changed; `true` means online.
    Connectivity(bool),
    /// The page is going away.
    Unload,
}

#[derive(Clone)]
pub struct Tracker {
    shared: Arc<Shared>,
}

struct Shared {
    config: TrackerConfig,
    transport: Arc<dyn Transport>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    state: Mutex<Inner>,
    /// Serializes `start_session` so concurrent callers share one start.
    start_lock: tokio::sync::Mutex<()>,
}

struct Inner {
    phase: Phase,
    session: Option<Session>,
    auth: AuthGate,
    visible: bool,
    /// Wall-clock time the page was hidden, while hidden.
    hidden_since: Option<i64>,
    online: bool,
    backlog: Backlog,
    flushing: bool,
    heartbeat: Option<JoinHandle<()>>,
    inactivity: Option<JoinHandle<()>>,
    /// Last smart-join per project, for the client-side cooldown.
    recent_joins: HashMap<String, tokio::time::Instant>,
}

impl Inner {
    fn live_session(&self) -> Option<&Session> {
        if self.phase.is_live() { self.session.as_ref() } else { None }
    }

    fn live_session_mut(&mut self) -> Option<&mut Session> {
        if self.phase.is_live() { self.session.as_mut() } else { None }
    }

    fn live_session_id(&self) -> Option<String> {
        self.live_session().map(|s| s.session_id.clone())
    }

    /// Apply `trigger`, returning `false` (and leaving the phase alone) when
    /// it is not legal from the current phase.
    fn advance(&mut self, trigger: Trigger) -> bool {
        match transition(self.phase, trigger) {
            Ok(next) => {
                debug!(from = %self.phase, to = %next, "session phase");
                self.phase = next;
                true
            }
            Err(e) => {
                debug!(error = %e, "ignored lifecycle transition");
                false
            }
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
        if let Some(handle) = self.inactivity.take() {
            handle.abort();
        }
    }
}

impl Tracker {
    #[must_use]
    pub fn new(
        config: TrackerConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inner = Inner {
            phase: Phase::Idle,
            session: None,
            auth: AuthGate::new(),
            visible: true,
            hidden_since: None,
            online: true,
            backlog: Backlog::new(config.backlog_capacity),
            flushing: false,
            heartbeat: None,
            inactivity: None,
            recent_joins: HashMap::new(),
        };
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                store: SessionStore::new(storage),
                clock,
                state: Mutex::new(inner),
                start_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn now(&self) -> i64 {
        self.shared.clock.now_ms()
    }

    fn live_session_id(&self) -> Option<String> {
        self.lock().live_session_id()
    }

    /// Route one inbound signal to the matching operation.
    pub async fn dispatch(&self, signal: Signal) {
        match signal {
            Signal::Tick => {
                self.send_heartbeat_now().await;
            }
            Signal::Interaction(kind) => self.record_interaction(kind),
            Signal::Visibility(visible) => self.set_visibility(visible).await,
            Signal::Connectivity(online) => self.set_online(online).await,
            Signal::Unload => {
                self.end_session().await;
            }
        }
    }

    // =========================================================================
    // INTROSPECTION
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    #[must_use]
    pub fn has_active_session(&self) -> bool {
        self.lock().live_session().is_some()
    }

    #[must_use]
    pub fn current_session(&self) -> Option<SessionInfo> {
        self.lock().live_session().map(Session::info)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().auth.is_authenticated()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.lock().backlog.len()
    }

    #[must_use]
    pub fn backlog_capacity(&self) -> usize {
        self.lock().backlog.capacity()
    }

    /// Events dropped from the backlog for capacity since the tracker started.
    #[must_use]
    pub fn backlog_evicted(&self) -> u64 {
        self.lock().backlog.evicted()
    }

    /// Time since the live session's last recorded activity.
    #[must_use]
    pub fn idle_time(&self) -> Option<Duration> {
        let now = self.now();
        let inner = self.lock();
        let idle = inner.live_session()?.idle_ms(now);
        Some(Duration::from_millis(u64::try_from(idle).unwrap_or(0)))
    }

    /// `true` while a heartbeat timer is armed.
    #[must_use]
    pub fn heartbeat_armed(&self) -> bool {
        self.lock()
            .heartbeat
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

#[cfg(test)]
#[path = "tracker_test.rs"]
mod tests;
