use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{SourceSettings, StreamFormat};
use crate::capture::{AmplitudeMode, PipelineConfig};
use crate::encoder::Codec;
use crate::sink::SinkKind;

/// Prefix for environment overrides, e.g. `WAVECAP_WAVEFORM__CAPACITY=512`
pub const ENV_PREFIX: &str = "WAVECAP";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub encoder: EncoderConfig,
    pub pipeline: PipelineSettings,
    pub waveform: WaveformConfig,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "waveform-capture".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frame duration in milliseconds
    pub frame_ms: u64,
    pub amplitude: AmplitudeMode,
    /// Pace file and tone sources at wall-clock speed
    pub realtime: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_ms: 100,
            amplitude: AmplitudeMode::Rms,
            realtime: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub codec: Codec,
    /// Frames buffered per emitted chunk
    pub frames_per_chunk: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Wav,
            frames_per_chunk: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub queue_capacity: usize,
    pub drain_timeout_ms: u64,
    pub max_consecutive_failures: u32,
    pub event_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let defaults = PipelineConfig::default();
        Self {
            queue_capacity: defaults.queue_capacity,
            drain_timeout_ms: defaults.drain_timeout.as_millis() as u64,
            max_consecutive_failures: defaults.max_consecutive_failures,
            event_capacity: defaults.event_capacity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    /// Amplitude samples kept for rendering
    pub capacity: usize,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub output_dir: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Directory,
            output_dir: "~/.waveform-capture/recordings".to_string(),
        }
    }
}

impl Config {
    /// Load a config file (format from its extension) plus environment
    /// overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to load config: {}", path))?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            queue_capacity: self.pipeline.queue_capacity,
            drain_timeout: Duration::from_millis(self.pipeline.drain_timeout_ms),
            max_consecutive_failures: self.pipeline.max_consecutive_failures,
            amplitude_mode: self.capture.amplitude,
            event_capacity: self.pipeline.event_capacity,
        }
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            format: StreamFormat {
                sample_rate: self.capture.sample_rate,
                channels: self.capture.channels,
            },
            frame_ms: self.capture.frame_ms,
            realtime: self.capture.realtime,
        }
    }

    /// Sink output directory with `~` expanded
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.sink.output_dir).into_owned())
    }
}
