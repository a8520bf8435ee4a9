//! Capture pipeline
//!
//! This module owns the microphone stream for one recording session at a time:
//! - State machine (`Idle → Requesting → Recording ⇄ Paused → Stopped`)
//! - Per-frame amplitude sampling into the waveform buffer
//! - Encode worker with drop-oldest backpressure and ordered chunk delivery
//! - Session summaries and pipeline events

pub mod amplitude;
mod chunk;
mod events;
mod pipeline;
mod queue;
mod session;
mod state;
mod worker;

pub use amplitude::AmplitudeMode;
pub use chunk::{AudioChunk, SinkContext};
pub use events::{EventBus, PipelineEvent};
pub use pipeline::{CapturePipeline, PipelineConfig};
pub use session::{RecordingSession, SessionOutcome, SessionSummary};
pub use state::{CaptureState, Transition};
