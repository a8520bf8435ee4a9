use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single amplitude summary for one captured frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AmplitudeSample {
    /// Peak or RMS magnitude, normalized to 0.0..=1.0
    pub value: f32,
    /// Offset from the start of the session (paused time excluded)
    pub offset: Duration,
}

impl AmplitudeSample {
    pub fn new(value: f32, offset: Duration) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
            offset,
        }
    }
}

/// Fixed-capacity ring of amplitude samples
///
/// Storage is allocated once per capacity; `push` never allocates and evicts
/// the oldest sample once the ring is full.
#[derive(Debug, Clone)]
pub struct WaveformBuffer {
    slots: Box<[AmplitudeSample]>,
    /// Index of the oldest sample
    head: usize,
    len: usize,
}

impl WaveformBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![AmplitudeSample::default(); capacity.max(1)].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a sample, evicting the oldest one first when full
    #[inline]
    pub fn push(&mut self, sample: AmplitudeSample) {
        let capacity = self.capacity();
        if self.len == capacity {
            self.slots[self.head] = sample;
            self.head = (self.head + 1) % capacity;
        } else {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = sample;
            self.len += 1;
        }
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &AmplitudeSample> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |i| &self.slots[(self.head + i) % capacity])
    }

    /// Copy of the current contents in arrival order
    pub fn snapshot(&self) -> Vec<AmplitudeSample> {
        self.iter().copied().collect()
    }

    /// Copy the contents into `out`, reusing its allocation
    pub fn copy_into(&self, out: &mut Vec<AmplitudeSample>) {
        out.clear();
        out.extend(self.iter().copied());
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Change capacity. Shrinking drops the oldest samples; growing keeps
    /// every sample.
    pub fn resize(&mut self, new_capacity: usize) {
        let new_capacity = new_capacity.max(1);
        if new_capacity == self.capacity() {
            return;
        }

        let keep = self.len.min(new_capacity);
        let skip = self.len - keep;
        let mut slots = vec![AmplitudeSample::default(); new_capacity].into_boxed_slice();
        for (slot, sample) in slots.iter_mut().zip(self.iter().skip(skip)) {
            *slot = *sample;
        }

        self.slots = slots;
        self.head = 0;
        self.len = keep;
    }
}
