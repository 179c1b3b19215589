//! Session model, the one live unit of tracked presence.
//!
//! DESIGN
//! ======
//! `Session` is owned by the tracker and only mutated under its lock. The
//! persisted `SessionDescriptor` and the heartbeat `PresenceSnapshot` are
//! both projections of it; neither is ever written back into the session.
//!
//! `start_time` is fixed at construction (or taken verbatim from a restored
//! descriptor) and `last_activity` only moves forward.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Origin of the session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// Id issued by the backend.
    Server,
    /// Id generated locally after the backend could not be reached.
    Local,
    /// Restored from the local session store.
    Restored,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub user_id: Option<String>,
    pub start_time: i64,
    pub last_activity: i64,
    pub current_project_id: Option<String>,
    pub current_page: Option<String>,
    pub source: SessionSource,
    pages_viewed: HashSet<String>,
    projects_viewed: HashSet<String>,
    event_count: u64,
}

impl Session {
    #[must_use]
    pub fn new(session_id: String, user_id: Option<String>, now_ms: i64, source: SessionSource) -> Self {
        Self {
            session_id,
            user_id,
            start_time: now_ms,
            last_activity: now_ms,
            current_project_id: None,
            current_page: None,
            source,
            pages_viewed: HashSet::new(),
            projects_viewed: HashSet::new(),
            event_count: 0,
        }
    }

    /// Rebuild a session from a stored descriptor, keeping its start time
    /// and presence fields.
    #[must_use]
    pub fn restore(descriptor: SessionDescriptor, user_id: Option<String>, now_ms: i64) -> Self {
        let start_time = descriptor.start_time;
        let mut session = Self::new(descriptor.session_id, user_id, start_time, SessionSource::Restored);
        session.last_activity = descriptor.last_activity.max(start_time);
        session.current_project_id = descriptor.current_project_id;
        session.current_page = descriptor.current_page;
        session.touch(now_ms);
        session
    }

    /// Move `last_activity` forward to `now_ms`. Earlier times are ignored.
    pub fn touch(&mut self, now_ms: i64) {
        if now_ms > self.last_activity {
            self.last_activity = now_ms;
        }
    }

    /// Milliseconds since the last recorded activity.
    #[must_use]
    pub fn idle_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.last_activity).max(0)
    }

    pub fn record_page_view(&mut self, page: &str) {
        self.pages_viewed.insert(page.to_owned());
    }

    pub fn record_project_view(&mut self, project_id: &str) {
        self.projects_viewed.insert(project_id.to_owned());
    }

    pub fn record_event(&mut self) {
        self.event_count += 1;
    }

    #[must_use]
    pub fn page_view_count(&self) -> usize {
        self.pages_viewed.len()
    }

    #[must_use]
    pub fn project_count(&self) -> usize {
        self.projects_viewed.len()
    }

    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    #[must_use]
    pub fn descriptor(&self) -> SessionDescriptor {
        SessionDescriptor {
            session_id: self.session_id.clone(),
            start_time: self.start_time,
            last_activity: self.last_activity,
            current_project_id: self.current_project_id.clone(),
            current_page: self.current_page.clone(),
            user_id: self.user_id.clone(),
        }
    }

    #[must_use]
    pub fn snapshot(&self, is_visible: bool) -> PresenceSnapshot {
        PresenceSnapshot {
            session_id: self.session_id.clone(),
            last_activity: self.last_activity,
            is_visible,
            current_project_id: self.current_project_id.clone(),
            current_page: self.current_page.clone(),
        }
    }

    /// Final counters reported when the session ends.
    #[must_use]
    pub fn summary(&self, now_ms: i64) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            duration_secs: u64::try_from((now_ms - self.start_time).max(0) / 1000).unwrap_or(0),
            page_views: self.page_view_count(),
            projects_viewed: self.project_count(),
            events: self.event_count,
        }
    }

    #[must_use]
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            start_time: self.start_time,
            last_activity: self.last_activity,
            current_project_id: self.current_project_id.clone(),
            current_page: self.current_page.clone(),
            source: self.source,
            page_views: self.page_view_count(),
            projects_viewed: self.project_count(),
            events: self.event_count,
        }
    }
}

/// Persisted form of a session. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub session_id: String,
    pub start_time: i64,
    pub last_activity: i64,
    pub current_project_id: Option<String>,
    pub current_page: Option<String>,
    /// Owner of the session. Older descriptors may lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl SessionDescriptor {
    /// Milliseconds between the last recorded activity and `now_ms`.
    #[must_use]
    pub fn staleness_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.last_activity).max(0)
    }
}

/// Heartbeat payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub session_id: String,
    pub last_activity: i64,
    pub is_visible: bool,
    pub current_project_id: Option<String>,
    pub current_page: Option<String>,
}

/// Counters sent with the session-end notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    pub duration_secs: u64,
    pub page_views: usize,
    pub projects_viewed: usize,
    pub events: u64,
}

/// Read-only view of the live session for callers outside the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: Option<String>,
    pub start_time: i64,
    pub last_activity: i64,
    pub current_project_id: Option<String>,
    pub current_page: Option<String>,
    pub source: SessionSource,
    pub page_views: usize,
    pub projects_viewed: usize,
    pub events: u64,
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
