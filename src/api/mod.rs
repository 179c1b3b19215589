//! Analytics backend client.
//!
//! DESIGN
//! ======
//! The tracker talks to the backend only through the [`Transport`] trait so
//! tests can substitute a recording fake. Every method returns a typed
//! [`ApiError`]; the tracker decides per call site whether a failure is
//! buffered, retried, or tears the session down.

pub mod http;
pub mod types;

pub use http::HttpTransport;
pub use types::{
    ApiError, AuthUser, EndSessionRequest, ProjectSwitchRequest, SmartJoinRequest, SmartJoinResponse,
    StartSessionResponse,
};

use crate::events::QueuedEvent;
use crate::session::PresenceSnapshot;

/// Header carrying the session id on heartbeat and track calls.
pub const SESSION_HEADER: &str = "X-Session-Id";

/// Backend operations consumed by the tracker.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// `POST session/start`.
    async fn start_session(&self) -> Result<StartSessionResponse, ApiError>;

    /// `POST session/end` with the final counters.
    async fn end_session(&self, request: &EndSessionRequest) -> Result<(), ApiError>;

    /// `POST heartbeat`.
    async fn heartbeat(&self, snapshot: &PresenceSnapshot) -> Result<(), ApiError>;

    /// `POST track`, correlated by the event's session id.
    async fn track(&self, event: &QueuedEvent) -> Result<(), ApiError>;

    /// `POST project/switch`.
    async fn switch_project(&self, request: &ProjectSwitchRequest) -> Result<(), ApiError>;

    /// `POST smart-join`.
    async fn smart_join(&self, request: &SmartJoinRequest) -> Result<SmartJoinResponse, ApiError>;

    /// `GET auth/me`. An unauthenticated caller gets [`ApiError::Unauthorized`].
    async fn current_user(&self) -> Result<AuthUser, ApiError>;
}
