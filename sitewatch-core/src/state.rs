//! Connection lifecycle state machine.
//!
//! Models the full lifecycle of the single outbound connection with
//! validated transitions that return `Result` instead of panicking.
//!
//! ```text
//!  Closed ──► Connecting ──► Open
//!    ▲            │            │
//!    │            ▼            ▼
//!    └────────── Error ◄───────┘
//! ```
//!
//! There is no terminal state — the manager may cycle indefinitely
//! while streaming remains desired.

use crate::error::StreamError;

/// The current lifecycle state of the analysis-service connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No active connection. Initial state.
    #[default]
    Closed,

    /// Connection initiated but not yet established.
    Connecting,

    /// Established and ready for frames and heartbeats.
    Open,

    /// Transport failure observed; transitions to `Closed` once the
    /// handle is torn down.
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Error => write!(f, "Error"),
        }
    }
}

impl ConnectionState {
    /// Returns `true` when the connection is established and ready
    /// for protocol traffic.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` when there is no active connection.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Closed`.
    pub fn begin_connect(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Closed => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(StreamError::InvalidTransition(
                "cannot connect: not in Closed state",
            )),
        }
    }

    /// Transition to `Open` once the transport signals establishment.
    ///
    /// Valid from: `Connecting`.
    pub fn mark_open(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Connecting => {
                *self = Self::Open;
                Ok(())
            }
            _ => Err(StreamError::InvalidTransition(
                "cannot open: not in Connecting state",
            )),
        }
    }

    /// Transition to `Error` on an abnormal transport failure.
    ///
    /// Valid from: `Connecting`, `Open`.
    pub fn mark_error(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Connecting | Self::Open => {
                *self = Self::Error;
                Ok(())
            }
            _ => Err(StreamError::InvalidTransition(
                "cannot fail: not in Connecting or Open state",
            )),
        }
    }

    /// Force-reset to `Closed` regardless of current state.
    ///
    /// Used for graceful close, error teardown, and explicit
    /// disconnect.
    pub fn force_closed(&mut self) {
        *self = Self::Closed;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut state = ConnectionState::default();
        assert!(state.is_closed());

        state.begin_connect().unwrap();
        assert_eq!(state, ConnectionState::Connecting);

        state.mark_open().unwrap();
        assert!(state.is_open());

        state.force_closed();
        assert!(state.is_closed());
    }

    #[test]
    fn abnormal_path_through_error() {
        let mut state = ConnectionState::Closed;
        state.begin_connect().unwrap();
        state.mark_error().unwrap();
        assert_eq!(state, ConnectionState::Error);

        state.force_closed();
        assert!(state.is_closed());
    }

    #[test]
    fn error_from_open() {
        let mut state = ConnectionState::Open;
        state.mark_error().unwrap();
        assert_eq!(state, ConnectionState::Error);
    }

    #[test]
    fn invalid_connect_when_open() {
        let mut state = ConnectionState::Open;
        assert!(state.begin_connect().is_err());
        assert!(state.is_open());
    }

    #[test]
    fn invalid_open_from_closed() {
        let mut state = ConnectionState::Closed;
        assert!(state.mark_open().is_err());
    }

    #[test]
    fn invalid_error_from_closed() {
        let mut state = ConnectionState::Closed;
        assert!(state.mark_error().is_err());
    }

    #[test]
    fn force_closed_from_any_state() {
        for mut state in [
            ConnectionState::Closed,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Error,
        ] {
            state.force_closed();
            assert!(state.is_closed());
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Open.to_string(), "Open");
        assert_eq!(ConnectionState::Error.to_string(), "Error");
    }
}
