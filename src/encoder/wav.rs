use anyhow::{Context, Result};
use std::io::Cursor;

use super::{check_format, Encoder};
use crate::audio::{AudioFrame, StreamFormat};

/// Emits each chunk as a self-contained 16-bit WAV file
pub struct WavEncoder {
    frames_per_chunk: usize,
    format: StreamFormat,
    pending: Vec<i16>,
    pending_frames: usize,
}

impl WavEncoder {
    pub fn new(frames_per_chunk: usize) -> Self {
        Self {
            frames_per_chunk: frames_per_chunk.max(1),
            format: StreamFormat::default(),
            pending: Vec::new(),
            pending_frames: 0,
        }
    }

    fn write_wav(&mut self) -> Result<Vec<u8>> {
        let samples = std::mem::take(&mut self.pending);
        self.pending_frames = 0;

        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
                .context("Failed to create WAV writer")?;
            for sample in samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV chunk")?;
        }

        Ok(bytes)
    }
}

impl Encoder for WavEncoder {
    fn reset(&mut self, format: StreamFormat) {
        self.format = format;
        self.pending.clear();
        self.pending_frames = 0;
    }

    fn encode(&mut self, frame: &AudioFrame) -> Result<Option<Vec<u8>>> {
        if let Err(e) = check_format(self.format, frame) {
            self.pending.clear();
            self.pending_frames = 0;
            return Err(e);
        }

        self.pending.extend_from_slice(&frame.samples);
        self.pending_frames += 1;

        if self.pending_frames >= self.frames_per_chunk {
            self.write_wav().map(Some)
        } else {
            Ok(None)
        }
    }

    fn flush(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pending_frames == 0 {
            return Ok(None);
        }
        self.write_wav().map(Some)
    }

    fn codec(&self) -> &str {
        "wav"
    }

    fn file_extension(&self) -> &str {
        "wav"
    }
}
