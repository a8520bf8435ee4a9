use serde::Serialize;
use triple_buffer::{Input, Output, TripleBuffer};

use super::buffer::{AmplitudeSample, WaveformBuffer};

/// Point-in-time copy of the waveform for a rendering client
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaveformSnapshot {
    /// Samples in arrival order (oldest first)
    pub samples: Vec<AmplitudeSample>,
    /// Capacity of the ring at the time of the snapshot
    pub capacity: usize,
    /// Number of mutations published so far; increases on every push/clear/resize
    pub version: u64,
}

/// Create a connected writer/reader pair over a ring of `capacity` samples
pub fn waveform_channel(capacity: usize) -> (WaveformWriter, WaveformReader) {
    let ring = WaveformBuffer::new(capacity);
    let initial = WaveformSnapshot {
        samples: Vec::new(),
        capacity: ring.capacity(),
        version: 0,
    };
    let (input, output) = TripleBuffer::new(&initial).split();

    (
        WaveformWriter {
            ring,
            input,
            version: 0,
        },
        WaveformReader { output },
    )
}

/// Capture-side half: owns the ring and publishes after every mutation
///
/// Publishing goes through a triple buffer, so the writer never waits on the
/// reader and the reader only ever sees fully published states.
pub struct WaveformWriter {
    ring: WaveformBuffer,
    input: Input<WaveformSnapshot>,
    version: u64,
}

impl WaveformWriter {
    /// Append a sample and publish the ring.
    ///
    /// The ring update is O(1). Publishing copies at most `capacity` samples
    /// into a reused back buffer, so once the buffers have grown to capacity a
    /// push never allocates.
    pub fn push(&mut self, sample: AmplitudeSample) {
        self.ring.push(sample);
        self.publish();
    }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.publish();
    }

    pub fn resize(&mut self, new_capacity: usize) {
        self.ring.resize(new_capacity);
        self.publish();
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Writer-side copy; does not go through the triple buffer
    pub fn snapshot(&self) -> Vec<AmplitudeSample> {
        self.ring.snapshot()
    }

    fn publish(&mut self) {
        self.version += 1;
        let back = self.input.input_buffer();
        self.ring.copy_into(&mut back.samples);
        back.capacity = self.ring.capacity();
        back.version = self.version;
        self.input.publish();
    }
}

/// Render-side half
pub struct WaveformReader {
    output: Output<WaveformSnapshot>,
}

impl WaveformReader {
    /// Copy of the latest published waveform
    pub fn snapshot(&mut self) -> WaveformSnapshot {
        self.output.read().clone()
    }

    /// True when the writer published since the last read
    pub fn has_update(&self) -> bool {
        self.output.updated()
    }
}
