//! Waveform sample buffer
//!
//! A fixed-capacity ring of amplitude summaries, written by the capture
//! pipeline and read by a rendering client through snapshots.

mod buffer;
mod shared;

pub use buffer::{AmplitudeSample, WaveformBuffer};
pub use shared::{waveform_channel, WaveformReader, WaveformSnapshot, WaveformWriter};
