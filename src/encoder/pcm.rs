use anyhow::Result;

use super::{check_format, Encoder};
use crate::audio::{AudioFrame, StreamFormat};

/// Raw little-endian 16-bit PCM, batched `frames_per_chunk` frames at a time
pub struct PcmEncoder {
    frames_per_chunk: usize,
    format: StreamFormat,
    pending: Vec<u8>,
    pending_frames: usize,
}

impl PcmEncoder {
    pub fn new(frames_per_chunk: usize) -> Self {
        Self {
            frames_per_chunk: frames_per_chunk.max(1),
            format: StreamFormat::default(),
            pending: Vec::new(),
            pending_frames: 0,
        }
    }

    fn take_pending(&mut self) -> Vec<u8> {
        self.pending_frames = 0;
        std::mem::take(&mut self.pending)
    }
}

impl Encoder for PcmEncoder {
    fn reset(&mut self, format: StreamFormat) {
        self.format = format;
        self.pending.clear();
        self.pending_frames = 0;
    }

    fn encode(&mut self, frame: &AudioFrame) -> Result<Option<Vec<u8>>> {
        if let Err(e) = check_format(self.format, frame) {
            self.take_pending();
            return Err(e);
        }

        self.pending.extend(frame.samples.iter().flat_map(|s| s.to_le_bytes()));
        self.pending_frames += 1;

        if self.pending_frames >= self.frames_per_chunk {
            Ok(Some(self.take_pending()))
        } else {
            Ok(None)
        }
    }

    fn flush(&mut self) -> Result<Option<Vec<u8>>> {
        if self.pending_frames == 0 {
            return Ok(None);
        }
        Ok(Some(self.take_pending()))
    }

    fn codec(&self) -> &str {
        "pcm_s16le"
    }

    fn file_extension(&self) -> &str {
        "pcm"
    }
}
