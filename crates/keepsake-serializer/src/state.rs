//! Session state machine.

use std::cell::Cell;
use std::fmt;

use tracing::debug;

use crate::error::{SerializeError, SerializeResult};

/// What a [`Serializer`](crate::Serializer) is doing right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    #[default]
    Idle,
    Storing,
    Restoring,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Storing => "store",
            Self::Restoring => "restore",
        })
    }
}

/// Holds a serializer out of `Idle` until dropped, on success or error.
pub(crate) struct Session<'a> {
    state: &'a Cell<SessionState>,
}

impl<'a> Session<'a> {
    pub(crate) fn begin(state: &'a Cell<SessionState>, next: SessionState) -> SerializeResult<Self> {
        let current = state.get();
        if current != SessionState::Idle {
            return Err(SerializeError::Reentrant { state: current });
        }
        state.set(next);
        debug!(session = %next, "session started");
        Ok(Self { state })
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!(session = %self.state.get(), "session finished");
        self.state.set(SessionState::Idle);
    }
}
