use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a reading session within one mounted reader view.
///
/// `Unopened -> Opening -> Open -> Closing -> Closed`. A session whose
/// creation fails stays in `Opening` for the rest of the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unopened,
    Opening,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    /// States in which progress writes may still be scheduled.
    #[must_use]
    pub fn accepts_progress(self) -> bool {
        matches!(self, SessionState::Opening | SessionState::Open)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closing | SessionState::Closed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Unopened => "unopened",
            SessionState::Opening => "opening",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_opening_and_open_accept_progress() {
        assert!(!SessionState::Unopened.accepts_progress());
        assert!(SessionState::Opening.accepts_progress());
        assert!(SessionState::Open.accepts_progress());
        assert!(!SessionState::Closing.accepts_progress());
        assert!(!SessionState::Closed.accepts_progress());
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Closing.is_terminal());
        assert!(SessionState::Closed.is_terminal());
        assert!(!SessionState::Open.is_terminal());
    }
}
