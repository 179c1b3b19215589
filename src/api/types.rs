//! Wire types and errors for the analytics backend.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Classified failure of a backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (offline, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the caller or no longer knows the session.
    #[error("unauthorized: status {status}")]
    Unauthorized { status: u16 },

    /// Any other non-success status.
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),
}

impl ApiError {
    /// Map a non-success HTTP status onto an error.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status },
            _ => Self::Status { status, body },
        }
    }

    /// `true` when the session or user is no longer valid server-side.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// `true` when repeating the same call later may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { status: 408 | 429 | 500..=599, .. })
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_id: String,
    /// Whole seconds since the session started.
    pub duration: u64,
    pub page_views: usize,
    pub projects_viewed: usize,
    pub events: u64,
}

impl From<crate::session::SessionSummary> for EndSessionRequest {
    fn from(summary: crate::session::SessionSummary) -> Self {
        Self {
            session_id: summary.session_id,
            duration: summary.duration_secs,
            page_views: summary.page_views,
            projects_viewed: summary.projects_viewed,
            events: summary.events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSwitchRequest {
    pub session_id: String,
    pub new_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartJoinRequest {
    pub project_id: String,
    pub session_id: String,
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SmartJoinResponse {
    /// `false` when the backend suppressed the join as a duplicate.
    pub logged: bool,
}

/// Authenticated user as reported by `auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl AuthUser {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), name: None, email: None }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
