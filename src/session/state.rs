//! Session state machine
//!
//! A session is either `Idle` (no peer link) or `Connected` (exactly one
//! peer link with an active read loop). It cycles between the two for the
//! lifetime of the process.

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::NetworkError;

/// Possible states of the peer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No peer link
    #[default]
    Idle,
    /// One peer link, read loop running
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connected => write!(f, "Connected"),
        }
    }
}

impl SessionState {
    /// Returns true if a peer link exists
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// Returns valid transitions from this state
    pub fn valid_transitions(&self) -> &'static [SessionState] {
        match self {
            SessionState::Idle => &[SessionState::Connected],
            SessionState::Connected => &[SessionState::Idle],
        }
    }
}

/// State machine for the session lifecycle
#[derive(Debug)]
pub struct SessionStateMachine {
    current: SessionState,
    state_entered_at: Instant,
    links_established: u64,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Creates a new state machine in Idle state
    pub fn new() -> Self {
        Self {
            current: SessionState::Idle,
            state_entered_at: Instant::now(),
            links_established: 0,
        }
    }

    /// Returns the current state
    pub fn current(&self) -> SessionState {
        self.current
    }

    /// Returns true if the transition is valid
    pub fn can_transition(&self, to: SessionState) -> bool {
        self.current.valid_transitions().contains(&to)
    }

    /// Attempts to transition to a new state
    pub fn transition(&mut self, to: SessionState) -> Result<(), NetworkError> {
        if !self.can_transition(to) {
            return Err(NetworkError::InvalidStateTransition {
                from: self.current.to_string(),
                to: to.to_string(),
            });
        }

        self.current = to;
        self.state_entered_at = Instant::now();
        if to.is_connected() {
            self.links_established += 1;
        }

        Ok(())
    }

    /// Returns how long we've been in the current state
    pub fn time_in_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Number of links established since the session started
    pub fn links_established(&self) -> u64 {
        self.links_established
    }
}
