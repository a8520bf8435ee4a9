//! Pluggable audio encoders
//!
//! An encoder turns raw frames into encoded chunk payloads. It may buffer
//! several frames before emitting, so `encode` returns zero or one payload
//! per frame and `flush` drains whatever is still buffered.

mod pcm;
mod wav;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioFrame, StreamFormat};

pub use pcm::PcmEncoder;
pub use wav::WavEncoder;

/// Frame-to-chunk transform
///
/// When `encode` fails the encoder discards the chunk it was assembling;
/// the next call starts a fresh chunk.
pub trait Encoder: Send {
    /// Prepare for a new session with the negotiated format
    fn reset(&mut self, format: StreamFormat);

    /// Accept one frame, returning an encoded payload when a chunk completes
    fn encode(&mut self, frame: &AudioFrame) -> Result<Option<Vec<u8>>>;

    /// Emit any buffered frames as a final payload
    fn flush(&mut self) -> Result<Option<Vec<u8>>>;

    /// Codec name carried on every chunk
    fn codec(&self) -> &str;

    /// File extension used by file-based sinks
    fn file_extension(&self) -> &str;
}

/// Built-in codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Pcm,
    Wav,
}

/// Encoder factory
pub fn create_encoder(codec: Codec, frames_per_chunk: usize) -> Box<dyn Encoder> {
    match codec {
        Codec::Pcm => Box::new(PcmEncoder::new(frames_per_chunk)),
        Codec::Wav => Box::new(WavEncoder::new(frames_per_chunk)),
    }
}

/// Reject frames whose format differs from the negotiated one
pub(crate) fn check_format(format: StreamFormat, frame: &AudioFrame) -> Result<()> {
    if frame.sample_rate != format.sample_rate || frame.channels != format.channels {
        anyhow::bail!(
            "Frame format {}Hz/{}ch does not match stream format {}Hz/{}ch",
            frame.sample_rate,
            frame.channels,
            format.sample_rate,
            format.channels
        );
    }
    if frame.channels > 0 && frame.samples.len() % frame.channels as usize != 0 {
        anyhow::bail!(
            "Frame has {} samples, not a multiple of {} channels",
            frame.samples.len(),
            frame.channels
        );
    }
    Ok(())
}
