// Shared fixtures for the integration tests: scripted microphone sources,
// a slow sink, and helpers for waiting on pipeline events.

#![allow(dead_code)]

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use waveform_capture::{
    waveform_channel, AudioChunk, AudioFrame, CapturePipeline, CaptureStream, ChunkSink,
    MicrophoneSource, PcmEncoder, PipelineConfig, PipelineEvent, SinkContext, SourceError,
    SourceEvent, StreamFormat, WaveformReader,
};

pub const FORMAT: StreamFormat = StreamFormat {
    sample_rate: 16000,
    channels: 1,
};

/// 100ms of mono 16kHz audio at a constant level
pub fn frame(level: i16) -> AudioFrame {
    AudioFrame {
        samples: vec![level; 1600],
        sample_rate: FORMAT.sample_rate,
        channels: FORMAT.channels,
        timestamp_ms: 0,
    }
}

/// A frame the encoder will reject (wrong sample rate)
pub fn bad_frame() -> AudioFrame {
    AudioFrame {
        samples: vec![100; 800],
        sample_rate: 8000,
        channels: 1,
        timestamp_ms: 0,
    }
}

/// Test-side handle to a running `ScriptedSource`
#[derive(Clone, Default)]
pub struct Script {
    sender: Arc<Mutex<Option<mpsc::Sender<SourceEvent>>>>,
    starts: Arc<Mutex<usize>>,
    stops: Arc<Mutex<usize>>,
}

impl Script {
    pub async fn send(&self, event: SourceEvent) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow::anyhow!("source not started"))?;
        sender.send(event).await?;
        Ok(())
    }

    pub async fn send_frames(&self, frames: impl IntoIterator<Item = AudioFrame>) -> Result<()> {
        for frame in frames {
            self.send(SourceEvent::Frame(frame)).await?;
        }
        Ok(())
    }

    /// Drop the sender so the stream ends without an explicit event
    pub async fn hang_up(&self) {
        self.sender.lock().await.take();
    }

    pub async fn starts(&self) -> usize {
        *self.starts.lock().await
    }

    pub async fn stops(&self) -> usize {
        *self.stops.lock().await
    }
}

/// Microphone whose events are pushed by the test through a `Script`
pub struct ScriptedSource {
    script: Script,
    deny: Option<SourceError>,
}

impl ScriptedSource {
    pub fn new() -> (Self, Script) {
        let script = Script::default();
        (
            Self {
                script: script.clone(),
                deny: None,
            },
            script,
        )
    }

    /// A source whose `start` always fails with `error`
    pub fn failing(error: SourceError) -> Self {
        Self {
            script: Script::default(),
            deny: Some(error),
        }
    }
}

#[async_trait::async_trait]
impl MicrophoneSource for ScriptedSource {
    async fn start(&mut self) -> Result<CaptureStream, SourceError> {
        if let Some(error) = &self.deny {
            return Err(error.clone());
        }
        let (tx, rx) = mpsc::channel(1024);
        *self.script.sender.lock().await = Some(tx);
        *self.script.starts.lock().await += 1;
        Ok(CaptureStream {
            format: FORMAT,
            events: rx,
        })
    }

    async fn stop(&mut self) -> Result<()> {
        self.script.sender.lock().await.take();
        *self.script.stops.lock().await += 1;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Sink that takes `delay` per chunk and remembers what it received
#[derive(Clone)]
pub struct SlowSink {
    delay: Duration,
    pub delivered: Arc<Mutex<Vec<u64>>>,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl ChunkSink for SlowSink {
    async fn deliver(&mut self, chunk: AudioChunk) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.delivered.lock().await.push(chunk.sequence());
        Ok(())
    }
}

/// Sink that rejects every chunk
pub struct BrokenSink;

#[async_trait::async_trait]
impl ChunkSink for BrokenSink {
    async fn open(&mut self, _context: &SinkContext) -> Result<()> {
        Ok(())
    }

    async fn deliver(&mut self, _chunk: AudioChunk) -> Result<()> {
        anyhow::bail!("disk full")
    }
}

pub fn pipeline_with(
    config: PipelineConfig,
    source: impl MicrophoneSource + 'static,
    frames_per_chunk: usize,
    sink: impl ChunkSink + 'static,
    waveform_capacity: usize,
) -> (CapturePipeline, WaveformReader) {
    let (writer, reader) = waveform_channel(waveform_capacity);
    let pipeline = CapturePipeline::new(
        config,
        Box::new(source),
        Box::new(PcmEncoder::new(frames_per_chunk)),
        Box::new(sink),
        writer,
    );
    (pipeline, reader)
}

/// Wait for the first event matching `pred`, failing after two seconds
pub async fn wait_for<F>(
    events: &mut broadcast::Receiver<PipelineEvent>,
    mut pred: F,
) -> Result<PipelineEvent>
where
    F: FnMut(&PipelineEvent) -> bool,
{
    let found = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(e) => return Err(anyhow::anyhow!("event stream closed: {}", e)),
            }
        }
    })
    .await;

    match found {
        Ok(result) => result,
        Err(_) => anyhow::bail!("timed out waiting for pipeline event"),
    }
}

/// Wait until the active session has captured `secs` of audio
pub async fn wait_for_captured(pipeline: &CapturePipeline, secs: f64) -> Result<()> {
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(session) = pipeline.session().await {
                if session.duration_secs + 1e-6 >= secs {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    if reached.is_err() {
        anyhow::bail!("timed out waiting for {:.1}s of captured audio", secs);
    }
    Ok(())
}
