use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::state::CaptureState;
use crate::audio::StreamFormat;

/// One start-to-stop capture, as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    /// Unique session identifier
    pub id: String,
    /// When the source granted access
    pub started_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub channels: u16,
    pub state: CaptureState,
    /// Captured audio time so far, excluding pauses
    pub duration_secs: f64,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Stopped by the caller or the source ran out of input
    Completed,
    /// Too many consecutive encode failures
    FatalEncodeError,
    /// The stream ended or the device was lost
    StreamInterrupted,
    /// Encode work did not drain in time; summary holds partial data
    DrainTimeout,
}

/// Final statistics for a session, reported once when it stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub sample_rate: u32,
    pub channels: u16,

    /// Captured audio time, excluding pauses
    pub duration_secs: f64,

    /// Chunks produced by the encoder and handed to the sink
    pub chunk_count: u64,

    /// Frames accepted while recording
    pub frames_captured: u64,

    /// Frames dropped by encode-queue backpressure
    pub frames_dropped: u64,

    /// Frames (or flushes) the encoder rejected
    pub encode_errors: u64,

    /// Mean amplitude over every frame captured in the session
    pub average_amplitude: f32,

    pub outcome: SessionOutcome,

    /// Detail for non-completed outcomes
    pub detail: Option<String>,
}

/// Running counters for the active session
#[derive(Debug, Clone)]
pub(crate) struct SessionRecord {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub format: StreamFormat,
    pub duration: Duration,
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub chunks_emitted: u64,
    pub encode_errors: u64,
    amplitude_sum: f64,
}

impl SessionRecord {
    pub fn new(format: StreamFormat) -> Self {
        Self {
            id: format!("session-{}", uuid::Uuid::new_v4()),
            started_at: Utc::now(),
            format,
            duration: Duration::ZERO,
            frames_captured: 0,
            frames_dropped: 0,
            chunks_emitted: 0,
            encode_errors: 0,
            amplitude_sum: 0.0,
        }
    }

    /// Account for one accepted frame; returns its index and session offset
    pub fn admit(&mut self, duration: Duration, amplitude: f32) -> (u64, Duration) {
        let index = self.frames_captured;
        let offset = self.duration;
        self.frames_captured += 1;
        self.duration += duration;
        self.amplitude_sum += amplitude as f64;
        (index, offset)
    }

    pub fn average_amplitude(&self) -> f32 {
        if self.frames_captured == 0 {
            return 0.0;
        }
        (self.amplitude_sum / self.frames_captured as f64) as f32
    }

    pub fn view(&self, state: CaptureState) -> RecordingSession {
        RecordingSession {
            id: self.id.clone(),
            started_at: self.started_at,
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
            state,
            duration_secs: self.duration.as_secs_f64(),
        }
    }

    pub fn summarize(&self, outcome: SessionOutcome, detail: Option<String>) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            started_at: self.started_at,
            sample_rate: self.format.sample_rate,
            channels: self.format.channels,
            duration_secs: self.duration.as_secs_f64(),
            chunk_count: self.chunks_emitted,
            frames_captured: self.frames_captured,
            frames_dropped: self.frames_dropped,
            encode_errors: self.encode_errors,
            average_amplitude: self.average_amplitude(),
            outcome,
            detail,
        }
    }
}
