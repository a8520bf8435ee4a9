//! Error types for the capture pipeline

use std::time::Duration;
use thiserror::Error;

use crate::capture::CaptureState;

/// Errors surfaced by the capture pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// The host refused microphone access. Retrying `start()` is allowed.
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// The operation is not valid in the current state; nothing changed.
    #[error("Cannot {op} while {state}")]
    InvalidStateTransition { op: &'static str, state: CaptureState },

    /// A single frame failed to encode; its chunk was dropped.
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Too many consecutive encode failures; the session was force-stopped.
    #[error("Session stopped after {consecutive} consecutive encode failures")]
    FatalEncodeError { consecutive: u32 },

    /// The microphone stream ended or the device went away.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Encode work did not drain in time; the session holds partial data.
    #[error("Encode queue did not drain within {0:?}")]
    DrainTimeout(Duration),

    /// The source failed for a reason other than permission.
    #[error("Source error: {0}")]
    Source(String),

    /// The chunk sink could not be opened for a new session.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Encoder and sink are still held by a worker that did not finish.
    #[error("Encoder is still busy with the previous session")]
    EncoderBusy,
}
