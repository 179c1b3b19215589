//! Event tracking with bounded retry and an offline backlog.
//!
//! DESIGN
//! ======
//! Each event is sent inline with linear backoff plus jitter. When the
//! retries run out, or the tracker is offline, the event goes to the
//! bounded backlog (oldest evicted first). The backlog drains in order
//! after the next successful send and whenever connectivity returns; a
//! single `flushing` flag keeps drains from overlapping.
//!
//! Auth rejections and other non-retryable statuses drop the event. A
//! request the backend refuses outright will not succeed on replay.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::Tracker;
use crate::api::ApiError;
use crate::backlog::retry_delay;
use crate::events::{self, EventType, MissingField, QueuedEvent};

/// What happened to a tracked event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Delivered,
    /// Held in the backlog for a later flush.
    Queued,
    /// Not tracked: no session, invalid input, or rejected by the backend.
    Dropped,
}

/// Clears the `flushing` flag even if the flush future is dropped.
struct FlushGuard<'a> {
    tracker: &'a Tracker,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.tracker.lock().flushing = false;
    }
}

impl Tracker {
    /// Track an event against the live session, starting one first when
    /// `auto_start` is enabled.
    pub async fn track_event(&self, event_type: EventType, data: Value) -> TrackOutcome {
        if self.ensure_session().await.is_none() {
            debug!(event_type = event_type.as_str(), "dropping event: no live session");
            return TrackOutcome::Dropped;
        }

        let event = {
            let mut inner = self.lock();
            let now = self.now();
            let Some(session) = inner.live_session_mut() else {
                return TrackOutcome::Dropped;
            };
            session.record_event();
            QueuedEvent::new(session.session_id.clone(), event_type, now, data)
        };
        self.deliver(event).await
    }

    pub async fn track_field_edit(
        &self,
        field: &str,
        old_value: &Value,
        new_value: &Value,
        entity: Option<&str>,
    ) -> TrackOutcome {
        match events::field_edit_data(field, old_value, new_value, entity) {
            Ok(data) => self.track_event(EventType::FieldEdit, data).await,
            Err(e) => rejected(&e),
        }
    }

    /// Track a page view and make `page` the current page.
    pub async fn track_page_view(&self, page: &str) -> TrackOutcome {
        if self.ensure_session().await.is_none() {
            return TrackOutcome::Dropped;
        }
        let project_id = self.current_project();
        let data = match events::page_view_data(page, project_id.as_deref()) {
            Ok(data) => data,
            Err(e) => return rejected(&e),
        };
        {
            let mut inner = self.lock();
            let Some(session) = inner.live_session_mut() else {
                return TrackOutcome::Dropped;
            };
            session.record_page_view(page);
            session.current_page = Some(page.to_owned());
            self.shared.store.save(&session.descriptor());
        }
        self.track_event(EventType::PageView, data).await
    }

    /// Track opening a project: switch presence to it, announce the join,
    /// record the event, then send a heartbeat carrying the new project.
    pub async fn track_project_open(&self, project_id: &str, project_name: Option<&str>) -> TrackOutcome {
        let data = match events::project_open_data(project_id, project_name) {
            Ok(data) => data,
            Err(e) => return rejected(&e),
        };
        if self.ensure_session().await.is_none() {
            return TrackOutcome::Dropped;
        }
        {
            let mut inner = self.lock();
            if let Some(session) = inner.live_session_mut() {
                session.record_project_view(project_id);
            }
        }
        self.update_project(Some(project_id), false).await;
        self.smart_join(project_id).await;
        let outcome = self.track_event(EventType::ProjectOpen, data).await;
        self.send_heartbeat_now().await;
        outcome
    }

    pub async fn track_action(&self, action: &str, details: Option<Value>) -> TrackOutcome {
        match events::action_data(action, details) {
            Ok(data) => self.track_event(EventType::Action, data).await,
            Err(e) => rejected(&e),
        }
    }

    pub async fn track_error(&self, message: &str, context: Option<&str>) -> TrackOutcome {
        match events::error_data(message, context) {
            Ok(data) => self.track_event(EventType::Error, data).await,
            Err(e) => rejected(&e),
        }
    }

    /// Apply a connectivity change. Coming back online drains the backlog.
    pub async fn set_online(&self, online: bool) {
        let came_online = {
            let mut inner = self.lock();
            let was_online = inner.online;
            inner.online = online;
            !was_online && online
        };
        if came_online {
            info!(queued = self.backlog_len(), "connectivity restored; flushing backlog");
            self.flush_backlog().await;
        } else if !online {
            debug!("offline; events will be queued");
        }
    }

    /// Send queued events oldest-first until the backlog is empty, a send
    /// fails, or the tracker goes offline. Returns how many were delivered.
    pub async fn flush_backlog(&self) -> usize {
        {
            let mut inner = self.lock();
            if inner.flushing || inner.backlog.is_empty() {
                return 0;
            }
            inner.flushing = true;
        }
        let _guard = FlushGuard { tracker: self };

        let mut delivered = 0;
        loop {
            let next = {
                let mut inner = self.lock();
                if inner.online { inner.backlog.pop() } else { None }
            };
            let Some(event) = next else {
                break;
            };
            match self.shared.transport.track(&event).await {
                Ok(()) => delivered += 1,
                Err(e) if e.retryable() => {
                    warn!(error = %e, "backlog flush interrupted");
                    if !self.lock().backlog.requeue(event) {
                        warn!("backlog full; dropped event on requeue");
                    }
                    break;
                }
                Err(e) => {
                    warn!(error = %e, event_type = event.event_type.as_str(), "dropping queued event");
                }
            }
        }
        if delivered > 0 {
            debug!(delivered, "backlog flushed");
        }
        delivered
    }

    async fn ensure_session(&self) -> Option<String> {
        {
            let inner = self.lock();
            if !inner.auth.is_authenticated() {
                return None;
            }
            if let Some(id) = inner.live_session_id() {
                return Some(id);
            }
        }
        if !self.shared.config.auto_start {
            return None;
        }
        self.start_session().await
    }

    async fn deliver(&self, event: QueuedEvent) -> TrackOutcome {
        let max_retries = self.shared.config.max_retries;
        let base = self.shared.config.retry_base_delay;
        let mut attempt = 0;

        loop {
            if !self.owns(&event) {
                return stale(&event);
            }
            if !self.is_online() {
                self.enqueue(event);
                return TrackOutcome::Queued;
            }
            let error: ApiError = match self.shared.transport.track(&event).await {
                Ok(()) => {
                    if self.backlog_len() > 0 {
                        self.flush_backlog().await;
                    }
                    return TrackOutcome::Delivered;
                }
                Err(e) => e,
            };
            if !error.retryable() {
                warn!(error = %error, event_type = event.event_type.as_str(), "event rejected; dropping");
                return TrackOutcome::Dropped;
            }
            if !self.owns(&event) {
                return stale(&event);
            }
            if attempt >= max_retries {
                warn!(error = %error, attempts = attempt + 1, "event delivery failed; queued");
                self.enqueue(event);
                return TrackOutcome::Queued;
            }
            attempt += 1;
            let delay = retry_delay(base, attempt);
            debug!(error = %error, attempt, delay_ms = delay.as_millis(), "retrying event");
            tokio::time::sleep(delay).await;
        }
    }

    /// `true` while `event` belongs to the live session.
    fn owns(&self, event: &QueuedEvent) -> bool {
        self.live_session_id().as_deref() == Some(event.session_id.as_str())
    }

    fn enqueue(&self, event: QueuedEvent) {
        let mut inner = self.lock();
        if let Some(evicted) = inner.backlog.push(event) {
            warn!(
                event_type = evicted.event_type.as_str(),
                timestamp = evicted.timestamp,
                "backlog full; dropped oldest event"
            );
        }
    }
}

fn stale(event: &QueuedEvent) -> TrackOutcome {
    debug!(
        session_id = %event.session_id,
        event_type = event.event_type.as_str(),
        "session no longer live; dropping event"
    );
    TrackOutcome::Dropped
}

fn rejected(error: &MissingField) -> TrackOutcome {
    warn!(event = error.event, field = error.field, "event missing required field; dropped");
    TrackOutcome::Dropped
}

#[cfg(test)]
#[path = "delivery_test.rs"]
mod tests;
