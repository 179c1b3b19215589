//! Session, heartbeat, and event telemetry for the collaboration client.
//!
//! The crate tracks one user session at a time: it starts or restores the
//! session, keeps presence alive with heartbeats, ends it on inactivity or
//! logout, and delivers analytics events with retry and an offline backlog.
//! [`Tracker`] is the entry point; everything else is plumbing it composes.

pub mod api;
pub mod auth;
pub mod backlog;
pub mod clock;
pub mod config;
pub mod events;
pub mod machine;
pub mod session;
pub mod storage;
pub mod tracker;

pub use api::{ApiError, AuthUser, HttpTransport, Transport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, TrackerConfig};
pub use events::EventType;
pub use machine::Phase;
pub use session::{SessionInfo, SessionSource};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tracker::{HeartbeatOutcome, Interaction, Signal, TrackOutcome, Tracker};
