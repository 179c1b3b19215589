//! Current project and page.
//!
//! A project change is announced with `project/switch` followed by an
//! immediate heartbeat, in that order, so the backend never sees a
//! heartbeat for the new project before the switch. Setting the same
//! project again is a no-op.

use std::time::Duration;

use tracing::{debug, warn};

use super::Tracker;
use crate::api::{ProjectSwitchRequest, SmartJoinRequest};

impl Tracker {
    /// Make `project_id` the current project of the live session.
    pub async fn set_current_project(&self, project_id: Option<&str>) {
        self.update_project(project_id, true).await;
    }

    #[must_use]
    pub fn current_project(&self) -> Option<String> {
        self.lock().live_session()?.current_project_id.clone()
    }

    /// Make `page` the current page of the live session.
    pub fn set_current_page(&self, page: Option<&str>) {
        let mut inner = self.lock();
        let Some(session) = inner.live_session_mut() else {
            return;
        };
        if session.current_page.as_deref() == page {
            return;
        }
        session.current_page = page.map(str::to_owned);
        self.shared.store.save(&session.descriptor());
    }

    #[must_use]
    pub fn current_page(&self) -> Option<String> {
        self.lock().live_session()?.current_page.clone()
    }

    /// Returns `true` when the project changed.
    pub(super) async fn update_project(&self, project_id: Option<&str>, heartbeat: bool) -> bool {
        let (session_id, online) = {
            let mut inner = self.lock();
            let online = inner.online;
            let Some(session) = inner.live_session_mut() else {
                return false;
            };
            if session.current_project_id.as_deref() == project_id {
                return false;
            }
            session.current_project_id = project_id.map(str::to_owned);
            self.shared.store.save(&session.descriptor());
            (session.session_id.clone(), online)
        };

        debug!(%session_id, project_id = ?project_id, "current project changed");
        if !online {
            return true;
        }
        let request = ProjectSwitchRequest {
            session_id,
            new_project_id: project_id.map(str::to_owned),
        };
        if let Err(e) = self.shared.transport.switch_project(&request).await {
            warn!(error = %e, "project switch notification failed");
        }
        if heartbeat {
            self.send_heartbeat_now().await;
        }
        true
    }

    /// Announce joining `project_id`, at most once per cooldown window.
    pub(super) async fn smart_join(&self, project_id: &str) {
        let cooldown = self.shared.config.join_cooldown;
        let session_id = {
            let mut inner = self.lock();
            if !inner.online {
                return;
            }
            let Some(session_id) = inner.live_session_id() else {
                return;
            };
            let now = tokio::time::Instant::now();
            prune_joins(&mut inner.recent_joins, now, cooldown);
            if inner.recent_joins.contains_key(project_id) {
                debug!(project_id, "smart-join suppressed by cooldown");
                return;
            }
            inner.recent_joins.insert(project_id.to_owned(), now);
            session_id
        };

        let request = SmartJoinRequest { project_id: project_id.to_owned(), session_id };
        match self.shared.transport.smart_join(&request).await {
            Ok(resp) => debug!(project_id, logged = resp.logged, "smart-join"),
            Err(e) => {
                warn!(project_id, error = %e, "smart-join failed");
                self.lock().recent_joins.remove(project_id);
            }
        }
    }
}

fn prune_joins(
    joins: &mut std::collections::HashMap<String, tokio::time::Instant>,
    now: tokio::time::Instant,
    cooldown: Duration,
) {
    joins.retain(|_, at| now.duration_since(*at) < cooldown);
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
