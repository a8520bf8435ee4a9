use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use super::file::FileSource;
use super::tone::ToneSource;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since the stream started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Number of sample frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Playback duration of this block
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let nanos = self.frame_count() as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sample rate and channel count agreed with the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// Events delivered by a running source, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A fixed-size block of raw audio
    Frame(AudioFrame),
    /// The device went away or the OS revoked access
    DeviceLost(String),
    /// A finite source ran out of input
    EndOfInput,
}

/// A started source: the negotiated format plus its event stream
pub struct CaptureStream {
    pub format: StreamFormat,
    pub events: mpsc::Receiver<SourceEvent>,
}

/// Why a source could not start
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Audio source unavailable: {0}")]
    Unavailable(String),
}

/// Microphone input abstraction
///
/// Implementations:
/// - `FileSource`: replays a WAV file in fixed-size frames
/// - `ToneSource`: synthetic sine generator for demos
///
/// Host integrations (cpal, PipeWire, browser bridges) implement the same
/// trait and report permission and device loss through `start` and
/// `SourceEvent::DeviceLost`.
#[async_trait::async_trait]
pub trait MicrophoneSource: Send + Sync {
    /// Request access and start streaming frames
    async fn start(&mut self) -> Result<CaptureStream, SourceError>;

    /// Stop streaming. Safe to call when not capturing.
    async fn stop(&mut self) -> anyhow::Result<()>;

    /// Check if the source is currently streaming
    fn is_capturing(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Frame sizing shared by the built-in sources
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSettings {
    /// Requested format (file sources use the file's own format)
    pub format: StreamFormat,
    /// Frame duration in milliseconds
    pub frame_ms: u64,
    /// Deliver frames at wall-clock pace
    pub realtime: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            format: StreamFormat::default(),
            frame_ms: 100,
            realtime: true,
        }
    }
}

impl SourceSettings {
    pub fn samples_per_frame(&self, format: StreamFormat) -> usize {
        let per_channel = (format.sample_rate as u64 * self.frame_ms / 1000).max(1);
        per_channel as usize * format.channels.max(1) as usize
    }
}

/// Built-in source selection
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Replay a WAV file
    File(PathBuf),
    /// Sine tone at the given frequency
    Tone { frequency_hz: f32 },
}

/// Source factory
pub struct SourceFactory;

impl SourceFactory {
    pub fn create(kind: SourceKind, settings: SourceSettings) -> Box<dyn MicrophoneSource> {
        match kind {
            SourceKind::File(path) => Box::new(FileSource::new(path, settings)),
            SourceKind::Tone { frequency_hz } => Box::new(ToneSource::new(frequency_hz, settings)),
        }
    }
}
