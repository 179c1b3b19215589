//! Recording fake transport and tracker fixtures for tracker tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::Tracker;
use crate::api::{
    ApiError, AuthUser, EndSessionRequest, ProjectSwitchRequest, SmartJoinRequest, SmartJoinResponse,
    StartSessionResponse, Transport,
};
use crate::clock::ManualClock;
use crate::config::TrackerConfig;
use crate::events::QueuedEvent;
use crate::session::{PresenceSnapshot, SessionDescriptor};
use crate::storage::{MemoryStore, SessionStore};

pub const T0: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start,
    End(EndSessionRequest),
    Heartbeat(PresenceSnapshot),
    Track(QueuedEvent),
    Switch(ProjectSwitchRequest),
    SmartJoin(SmartJoinRequest),
    Me,
}

#[derive(Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    started: AtomicUsize,
    pub start_error: Mutex<Option<ApiError>>,
    pub start_delay: Mutex<Option<Duration>>,
    pub end_delay: Mutex<Option<Duration>>,
    pub heartbeat_errors: Mutex<VecDeque<ApiError>>,
    /// Number of upcoming track calls that fail with a network error.
    pub track_failures: AtomicUsize,
    pub track_error: Mutex<Option<ApiError>>,
    pub me: Mutex<Option<Result<AuthUser, ApiError>>>,
}

impl FakeTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn heartbeats(&self) -> usize {
        self.count(|c| matches!(c, Call::Heartbeat(_)))
    }

    pub fn starts(&self) -> usize {
        self.count(|c| matches!(c, Call::Start))
    }

    pub fn ends(&self) -> Vec<EndSessionRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::End(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn tracked(&self) -> Vec<QueuedEvent> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Track(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn start_session(&self) -> Result<StartSessionResponse, ApiError> {
        self.record(Call::Start);
        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let error = self.start_error.lock().unwrap().clone();
        if let Some(e) = error {
            return Err(e);
        }
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StartSessionResponse { session_id: format!("srv-{n}") })
    }

    async fn end_session(&self, request: &EndSessionRequest) -> Result<(), ApiError> {
        self.record(Call::End(request.clone()));
        let delay = *self.end_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn heartbeat(&self, snapshot: &PresenceSnapshot) -> Result<(), ApiError> {
        self.record(Call::Heartbeat(snapshot.clone()));
        match self.heartbeat_errors.lock().unwrap().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn track(&self, event: &QueuedEvent) -> Result<(), ApiError> {
        self.record(Call::Track(event.clone()));
        if let Some(e) = self.track_error.lock().unwrap().clone() {
            return Err(e);
        }
        let remaining = self.track_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.track_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Network("connection refused".into()));
        }
        Ok(())
    }

    async fn switch_project(&self, request: &ProjectSwitchRequest) -> Result<(), ApiError> {
        self.record(Call::Switch(request.clone()));
        Ok(())
    }

    async fn smart_join(&self, request: &SmartJoinRequest) -> Result<SmartJoinResponse, ApiError> {
        self.record(Call::SmartJoin(request.clone()));
        Ok(SmartJoinResponse { logged: true })
    }

    async fn current_user(&self) -> Result<AuthUser, ApiError> {
        self.record(Call::Me);
        self.me
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Unauthorized { status: 401 }))
    }
}

/// Small, deterministic timings for paused-clock tests.
pub fn test_config() -> TrackerConfig {
    TrackerConfig {
        heartbeat_interval: Duration::from_secs(30),
        restore_threshold: Duration::from_secs(15 * 60),
        inactivity_timeout: Duration::from_secs(30 * 60),
        sleep_threshold: Duration::from_secs(5 * 60),
        backlog_capacity: 200,
        max_retries: 3,
        retry_base_delay: Duration::from_millis(1000),
        join_cooldown: Duration::from_secs(60),
        ..TrackerConfig::default()
    }
}

pub struct Harness {
    pub tracker: Tracker,
    pub transport: Arc<FakeTransport>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// A tracker with no signed-in user.
    pub fn anonymous(config: TrackerConfig) -> Self {
        let transport = Arc::new(FakeTransport::default());
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(T0));
        let tracker = Tracker::new(config, transport.clone(), store.clone(), clock.clone());
        Self { tracker, transport, store, clock }
    }

    /// A tracker signed in as `u1`.
    pub async fn signed_in(config: TrackerConfig) -> Self {
        let harness = Self::anonymous(config);
        harness.tracker.login(AuthUser::new("u1")).await;
        harness
    }

    /// The descriptor currently persisted for the tracker.
    pub fn stored(&self) -> Option<SessionDescriptor> {
        SessionStore::new(self.store.clone()).load()
    }

    /// Seed the store as a previous page load would have left it.
    pub fn seed(&self, descriptor: &SessionDescriptor) {
        SessionStore::new(self.store.clone()).save(descriptor);
    }
}
