use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::source::{
    AudioFrame, CaptureStream, MicrophoneSource, SourceError, SourceEvent, SourceSettings,
    StreamFormat,
};

/// A WAV file loaded into memory as 16-bit PCM
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            anyhow::bail!(
                "Unsupported WAV format: {} bits {:?} (expected 16-bit PCM)",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    pub fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Split the file into consecutive frames of `samples_per_frame`
    /// interleaved samples; the last frame may be shorter.
    pub fn frames(&self, samples_per_frame: usize) -> Vec<AudioFrame> {
        let samples_per_frame = samples_per_frame.max(self.channels.max(1) as usize);
        let per_channel = samples_per_frame as u64 / self.channels.max(1) as u64;

        self.samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, block)| AudioFrame {
                samples: block.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * per_channel * 1000 / self.sample_rate.max(1) as u64,
            })
            .collect()
    }
}

/// Replays a WAV file as if it were a live microphone
pub struct FileSource {
    path: PathBuf,
    settings: SourceSettings,
    task: Option<JoinHandle<()>>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, settings: SourceSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneSource for FileSource {
    async fn start(&mut self) -> Result<CaptureStream, SourceError> {
        if self.task.is_some() {
            return Err(SourceError::Unavailable("file source already started".into()));
        }

        let file = AudioFile::open(&self.path)
            .map_err(|e| SourceError::Unavailable(format!("{:#}", e)))?;
        let format = file.format();
        let frames = file.frames(self.settings.samples_per_frame(format));
        let pace = self
            .settings
            .realtime
            .then(|| Duration::from_millis(self.settings.frame_ms));

        let (tx, rx) = mpsc::channel(64);
        let path = file.path.clone();

        self.task = Some(tokio::spawn(async move {
            for frame in frames {
                if tx.send(SourceEvent::Frame(frame)).await.is_err() {
                    return;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
            info!("File source reached end of input: {}", path);
            let _ = tx.send(SourceEvent::EndOfInput).await;
        }));

        Ok(CaptureStream { format, events: rx })
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("File source task failed: {}", e);
                }
            }
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "file"
    }
}
