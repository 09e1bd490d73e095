//! Lifecycle of the managed goodbyedpi instance.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Starting,
    Running,
    Stopping,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot go from {from:?} to {to:?}")]
    InvalidTransition { from: State, to: State },
}

/// Every edge the supervisor may take.
const EDGES: &[(State, State)] = &[
    (State::Idle, State::Starting),
    (State::Starting, State::Running),
    // spawn failed, or the re-check did not see it
    (State::Starting, State::Idle),
    // exited on its own
    (State::Running, State::Idle),
    (State::Running, State::Stopping),
    // stop also kills an instance some earlier run left behind
    (State::Idle, State::Stopping),
    (State::Stopping, State::Idle),
];

#[derive(Debug)]
pub struct StateMachine {
    pub state: State,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self { state: State::Idle }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_transition(&self, to: State) -> bool {
        EDGES.contains(&(self.state, to))
    }

    /// Move to `to`, returning the state left behind.
    pub fn transition(&mut self, to: State) -> Result<State, TransitionError> {
        let from = self.state;
        if !self.can_transition(to) {
            return Err(TransitionError::InvalidTransition { from, to });
        }
        tracing::info!("goodbyedpi lifecycle: {:?} -> {:?}", from, to);
        self.state = to;
        Ok(from)
    }
}
