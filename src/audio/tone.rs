use anyhow::Result;
use std::f32::consts::TAU;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::source::{
    AudioFrame, CaptureStream, MicrophoneSource, SourceError, SourceEvent, SourceSettings,
};

/// Period of the loudness envelope applied to the tone
const ENVELOPE_SECS: f32 = 4.0;

/// Synthetic microphone producing a sine tone with a slow swell
///
/// Useful for exercising the pipeline and waveform view without audio
/// hardware.
pub struct ToneSource {
    frequency_hz: f32,
    settings: SourceSettings,
    task: Option<JoinHandle<()>>,
}

impl ToneSource {
    pub fn new(frequency_hz: f32, settings: SourceSettings) -> Self {
        Self {
            frequency_hz,
            settings,
            task: None,
        }
    }

    /// Render `count` interleaved samples starting at absolute frame `start`
    fn render(frequency_hz: f32, sample_rate: u32, channels: u16, start: u64, count: usize) -> Vec<i16> {
        let channels = channels.max(1) as usize;
        let rate = sample_rate.max(1) as f32;
        let mut out = Vec::with_capacity(count);

        for i in 0..count / channels {
            let t = (start + i as u64) as f32 / rate;
            let envelope = 0.5 - 0.5 * (TAU * t / ENVELOPE_SECS).cos();
            let value = (TAU * frequency_hz * t).sin() * envelope * 0.8;
            let sample = (value * i16::MAX as f32) as i16;
            out.extend(std::iter::repeat(sample).take(channels));
        }

        out
    }
}

#[async_trait::async_trait]
impl MicrophoneSource for ToneSource {
    async fn start(&mut self) -> Result<CaptureStream, SourceError> {
        if self.task.is_some() {
            return Err(SourceError::Unavailable("tone source already started".into()));
        }

        let format = self.settings.format;
        let samples_per_frame = self.settings.samples_per_frame(format);
        let frames_per_block = (samples_per_frame / format.channels.max(1) as usize) as u64;
        let frame_ms = self.settings.frame_ms;
        let realtime = self.settings.realtime;
        let frequency_hz = self.frequency_hz;

        info!(
            "Tone source started: {:.0}Hz at {}Hz, {} channels",
            frequency_hz, format.sample_rate, format.channels
        );

        let (tx, rx) = mpsc::channel(64);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms.max(1)));
            let mut position = 0u64;
            loop {
                if realtime {
                    ticker.tick().await;
                }
                let samples = Self::render(
                    frequency_hz,
                    format.sample_rate,
                    format.channels,
                    position,
                    samples_per_frame,
                );
                let frame = AudioFrame {
                    samples,
                    sample_rate: format.sample_rate,
                    channels: format.channels,
                    timestamp_ms: position * 1000 / format.sample_rate.max(1) as u64,
                };
                position += frames_per_block;

                if tx.send(SourceEvent::Frame(frame)).await.is_err() {
                    break;
                }
            }
        }));

        Ok(CaptureStream { format, events: rx })
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            info!("Tone source stopped");
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn name(&self) -> &str {
        "tone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_silent_at_envelope_start() {
        let samples = ToneSource::render(440.0, 16000, 1, 0, 4);
        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.abs() < 10));
    }

    #[test]
    fn test_render_duplicates_across_channels() {
        let samples = ToneSource::render(440.0, 16000, 2, 16000, 320);
        assert_eq!(samples.len(), 320);
        for pair in samples.chunks_exact(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn test_tone_source_streams_frames() {
        let settings = SourceSettings {
            realtime: false,
            ..Default::default()
        };
        let mut source = ToneSource::new(220.0, settings);
        let mut stream = source.start().await.expect("tone source should start");

        assert_eq!(stream.format.sample_rate, 16000);
        for expected_ms in [0, 100, 200] {
            match stream.events.recv().await {
                Some(SourceEvent::Frame(frame)) => {
                    assert_eq!(frame.samples.len(), 1600);
                    assert_eq!(frame.timestamp_ms, expected_ms);
                }
                other => panic!("expected frame, got {:?}", other),
            }
        }

        source.stop().await.expect("stop should succeed");
        assert!(!source.is_capturing());
    }
}
