use std::time::Duration;

use crate::audio::StreamFormat;

/// An encoded slice of audio handed to a sink
///
/// Chunks are immutable once built; the pipeline gives up ownership on
/// delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    sequence: u64,
    offset: Duration,
    frame_count: usize,
    codec: String,
    format: StreamFormat,
    data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(
        sequence: u64,
        offset: Duration,
        frame_count: usize,
        codec: impl Into<String>,
        format: StreamFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            sequence,
            offset,
            frame_count,
            codec: codec.into(),
            format,
            data,
        }
    }

    /// Position in the session's chunk order, starting at 0
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Session offset of the first frame in this chunk
    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// Number of source frames encoded into this chunk
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn codec(&self) -> &str {
        &self.codec
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// What a sink needs to know about the session it receives chunks for
#[derive(Debug, Clone, PartialEq)]
pub struct SinkContext {
    pub session_id: String,
    pub format: StreamFormat,
    pub codec: String,
    /// File extension matching the codec
    pub extension: String,
}
