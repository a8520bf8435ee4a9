use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CaptureError;

/// Lifecycle of the capture pipeline
///
/// `Idle → Requesting → Recording ⇄ Paused → Stopped`. A new `start()` from
/// `Stopped` discards the finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    Requesting,
    Recording,
    Paused,
    Stopped,
}

/// Inputs that move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Caller asked to start a session
    Start,
    /// The source granted access
    Grant,
    /// The source refused access or failed to open
    Deny,
    Pause,
    Resume,
    /// Caller stop, end of input, or a session-ending error
    Finish,
}

impl Transition {
    fn op(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Grant => "grant",
            Transition::Deny => "deny",
            Transition::Pause => "pause",
            Transition::Resume => "resume",
            Transition::Finish => "stop",
        }
    }
}

impl CaptureState {
    /// State after applying `transition`, or `InvalidStateTransition`
    pub fn next(self, transition: Transition) -> Result<CaptureState, CaptureError> {
        use CaptureState::*;

        match (self, transition) {
            (Idle | Stopped, Transition::Start) => Ok(Requesting),
            (Requesting, Transition::Grant) => Ok(Recording),
            (Requesting, Transition::Deny) => Ok(Idle),
            (Recording, Transition::Pause) => Ok(Paused),
            (Paused, Transition::Resume) => Ok(Recording),
            (Recording | Paused, Transition::Finish) => Ok(Stopped),
            (state, transition) => Err(CaptureError::InvalidStateTransition {
                op: transition.op(),
                state,
            }),
        }
    }

    /// A session exists and has not been finalized
    pub fn is_active(self) -> bool {
        matches!(self, CaptureState::Recording | CaptureState::Paused)
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::Requesting => "requesting",
            CaptureState::Recording => "recording",
            CaptureState::Paused => "paused",
            CaptureState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
