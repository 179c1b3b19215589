//! Session lifecycle phases and the transitions allowed between them.
//!
//! DESIGN
//! ======
//! ```text
//!   Idle --start--> Starting --started--> Active --end--> Ending --ended--> Ended
//!                      |                                                    |
//!                      +--abandon--> Idle          Ended --start--> Starting
//!   Active --invalidate--> Ended
//! ```
//! Every phase change in the tracker goes through [`transition`]. A rejected
//! transition (a second `end` while `Ending`, a heartbeat teardown racing a
//! start) means the caller lost the race and must do nothing.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Starting,
    Active,
    Ending,
    Ended,
}

impl Phase {
    /// `true` while a session is live and may be tracked against.
    #[must_use]
    pub fn is_live(self) -> bool {
        self == Self::Active
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Requested phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Begin creating or restoring a session.
    Start,
    /// The session id is known and timers are armed.
    Started,
    /// Start gave up (logged out mid-start, rejected by the backend).
    Abandon,
    /// Begin an orderly end.
    End,
    /// Orderly end finished.
    Ended,
    /// The backend no longer recognises the session; drop it immediately.
    Invalidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {trigger:?} from {from}")]
pub struct TransitionError {
    pub from: Phase,
    pub trigger: Trigger,
}

/// Compute the phase reached by applying `trigger` in `from`.
///
/// # Errors
///
/// Returns [`TransitionError`] when `trigger` is not allowed in `from`.
pub fn transition(from: Phase, trigger: Trigger) -> Result<Phase, TransitionError> {
    use Phase::{Active, Ended, Ending, Idle, Starting};

    match (from, trigger) {
        (Idle | Ended, Trigger::Start) => Ok(Starting),
        (Starting, Trigger::Started) => Ok(Active),
        (Starting, Trigger::Abandon) => Ok(Idle),
        (Active, Trigger::End) => Ok(Ending),
        (Ending, Trigger::Ended) => Ok(Ended),
        (Active, Trigger::Invalidate) => Ok(Ended),
        _ => Err(TransitionError { from, trigger }),
    }
}

#[cfg(test)]
#[path = "machine_test.rs"]
mod tests;
