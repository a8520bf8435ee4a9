use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::chunk::AudioChunk;
use super::events::PipelineEvent;
use super::pipeline::{SessionLink, Shared};
use super::queue::{CloseReason, Next, QueuedFrame};
use super::session::SessionOutcome;
use crate::audio::StreamFormat;
use crate::encoder::Encoder;
use crate::error::CaptureError;
use crate::sink::ChunkSink;

/// Result of feeding one frame (or a flush) to the encode stage
#[derive(Debug, PartialEq)]
pub(crate) enum StageOutcome {
    /// Accepted, no chunk completed yet
    Buffered,
    Emitted(AudioChunk),
    /// Chunk dropped; recording continues
    Failed { message: String, consecutive: u32 },
    /// The consecutive failure limit was reached
    Fatal { message: String, consecutive: u32 },
}

/// Sequencing around an encoder
///
/// Sequence numbers are assigned only when the encoder emits, so they are
/// gap-free and follow frame arrival order.
pub(crate) struct EncodeStage {
    encoder: Box<dyn Encoder>,
    format: StreamFormat,
    max_consecutive_failures: u32,
    next_sequence: u64,
    consecutive_failures: u32,
    /// Offset and frame count of the chunk being assembled
    pending_offset: Option<Duration>,
    pending_frames: usize,
}

impl EncodeStage {
    pub fn new(mut encoder: Box<dyn Encoder>, format: StreamFormat, max_consecutive_failures: u32) -> Self {
        encoder.reset(format);
        Self {
            encoder,
            format,
            max_consecutive_failures: max_consecutive_failures.max(1),
            next_sequence: 0,
            consecutive_failures: 0,
            pending_offset: None,
            pending_frames: 0,
        }
    }

    pub fn process(&mut self, queued: &QueuedFrame) -> StageOutcome {
        self.pending_offset.get_or_insert(queued.offset);
        self.pending_frames += 1;

        match self.encoder.encode(&queued.frame) {
            Ok(None) => {
                self.consecutive_failures = 0;
                StageOutcome::Buffered
            }
            Ok(Some(data)) => {
                self.consecutive_failures = 0;
                StageOutcome::Emitted(self.emit(data))
            }
            Err(e) => {
                // The encoder discarded the chunk it was assembling
                self.pending_offset = None;
                self.pending_frames = 0;
                self.consecutive_failures += 1;

                let message = format!("{:#}", e);
                if self.consecutive_failures >= self.max_consecutive_failures {
                    StageOutcome::Fatal {
                        message,
                        consecutive: self.consecutive_failures,
                    }
                } else {
                    StageOutcome::Failed {
                        message,
                        consecutive: self.consecutive_failures,
                    }
                }
            }
        }
    }

    /// Emit whatever the encoder still buffers. A flush failure never ends
    /// the session on its own.
    pub fn flush(&mut self) -> StageOutcome {
        match self.encoder.flush() {
            Ok(Some(data)) => StageOutcome::Emitted(self.emit(data)),
            Ok(None) => StageOutcome::Buffered,
            Err(e) => {
                self.pending_offset = None;
                self.pending_frames = 0;
                StageOutcome::Failed {
                    message: format!("{:#}", e),
                    consecutive: self.consecutive_failures + 1,
                }
            }
        }
    }

    pub fn into_encoder(self) -> Box<dyn Encoder> {
        self.encoder
    }

    fn emit(&mut self, data: Vec<u8>) -> AudioChunk {
        let chunk = AudioChunk::new(
            self.next_sequence,
            self.pending_offset.take().unwrap_or_default(),
            std::mem::take(&mut self.pending_frames),
            self.encoder.codec(),
            self.format,
            data,
        );
        self.next_sequence += 1;
        chunk
    }
}

/// Encoder and sink handed back when a worker finishes
pub(crate) struct WorkerOutput {
    pub encoder: Box<dyn Encoder>,
    pub sink: Box<dyn ChunkSink>,
}

/// Encode task: drains the session queue, delivers chunks in order, and
/// finalizes the session when the queue closes or encoding becomes fatal.
pub(crate) async fn run_worker(
    shared: Arc<Shared>,
    link: Arc<SessionLink>,
    mut stage: EncodeStage,
    mut sink: Box<dyn ChunkSink>,
) -> WorkerOutput {
    let (outcome, detail) = loop {
        match link.queue.next().await {
            Next::Frame(queued) => match stage.process(&queued) {
                StageOutcome::Buffered => {}
                StageOutcome::Emitted(chunk) => deliver(&shared, sink.as_mut(), chunk).await,
                StageOutcome::Failed { message, consecutive } => {
                    warn!(
                        "Encode failed for frame {} ({} in a row): {}",
                        queued.index, consecutive, message
                    );
                    let message = CaptureError::EncodeError(message).to_string();
                    shared.record_encode_error(Some(queued.index), message).await;
                }
                StageOutcome::Fatal { message, consecutive } => {
                    error!(
                        "Encode failed for frame {} ({} in a row), stopping session: {}",
                        queued.index, consecutive, message
                    );
                    let fatal = CaptureError::FatalEncodeError { consecutive };
                    let message = CaptureError::EncodeError(message).to_string();
                    shared.record_encode_error(Some(queued.index), message.clone()).await;
                    link.queue.close(CloseReason::Finished).await;
                    break (
                        SessionOutcome::FatalEncodeError,
                        Some(format!("{} ({})", fatal, message)),
                    );
                }
            },
            Next::Closed(reason) => {
                match stage.flush() {
                    StageOutcome::Emitted(chunk) => deliver(&shared, sink.as_mut(), chunk).await,
                    StageOutcome::Failed { message, .. } | StageOutcome::Fatal { message, .. } => {
                        warn!("Encoder flush failed: {}", message);
                        let message = CaptureError::EncodeError(message).to_string();
                        shared.record_encode_error(None, message).await;
                    }
                    StageOutcome::Buffered => {}
                }
                break match reason {
                    CloseReason::Finished => (SessionOutcome::Completed, None),
                    CloseReason::Interrupted(why) => (
                        SessionOutcome::StreamInterrupted,
                        Some(CaptureError::StreamInterrupted(why).to_string()),
                    ),
                };
            }
            Next::Cancelled => {
                debug!("Encode worker cancelled");
                break (SessionOutcome::DrainTimeout, None);
            }
        }
    };

    if let Err(e) = sink.close().await {
        error!("Failed to close sink: {:#}", e);
    }

    shared.finalize(&link, outcome, detail).await;

    WorkerOutput {
        encoder: stage.into_encoder(),
        sink,
    }
}

async fn deliver(shared: &Shared, sink: &mut dyn ChunkSink, chunk: AudioChunk) {
    let sequence = chunk.sequence();
    let bytes = chunk.len();
    shared.record_chunk(sequence, bytes).await;

    if let Err(e) = sink.deliver(chunk).await {
        error!("Sink rejected chunk {}: {:#}", sequence, e);
        shared.events().emit(PipelineEvent::SinkError {
            sequence,
            message: format!("{:#}", e),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFrame;
    use anyhow::Result;
    use proptest::prelude::*;

    /// Batches `batch` frames per chunk and fails on frames whose first
    /// sample is negative.
    struct ScriptedEncoder {
        batch: usize,
        buffered: usize,
    }

    impl Encoder for ScriptedEncoder {
        fn reset(&mut self, _format: StreamFormat) {
            self.buffered = 0;
        }

        fn encode(&mut self, frame: &AudioFrame) -> Result<Option<Vec<u8>>> {
            if frame.samples[0] < 0 {
                self.buffered = 0;
                anyhow::bail!("scripted failure");
            }
            self.buffered += 1;
            if self.buffered >= self.batch {
                self.buffered = 0;
                Ok(Some(vec![1]))
            } else {
                Ok(None)
            }
        }

        fn flush(&mut self) -> Result<Option<Vec<u8>>> {
            if self.buffered == 0 {
                return Ok(None);
            }
            self.buffered = 0;
            Ok(Some(vec![2]))
        }

        fn codec(&self) -> &str {
            "scripted"
        }

        fn file_extension(&self) -> &str {
            "bin"
        }
    }

    fn stage(batch: usize) -> EncodeStage {
        EncodeStage::new(
            Box::new(ScriptedEncoder { batch, buffered: 0 }),
            StreamFormat::default(),
            3,
        )
    }

    fn queued(index: u64, fail: bool) -> QueuedFrame {
        QueuedFrame {
            index,
            offset: Duration::from_millis(index * 100),
            frame: AudioFrame {
                samples: vec![if fail { -1 } else { 1 }; 4],
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: index * 100,
            },
        }
    }

    #[test]
    fn test_chunk_carries_first_frame_offset() {
        let mut stage = stage(2);
        assert_eq!(stage.process(&queued(0, false)), StageOutcome::Buffered);

        match stage.process(&queued(1, false)) {
            StageOutcome::Emitted(chunk) => {
                assert_eq!(chunk.sequence(), 0);
                assert_eq!(chunk.offset(), Duration::ZERO);
                assert_eq!(chunk.frame_count(), 2);
                assert_eq!(chunk.codec(), "scripted");
            }
            other => panic!("expected chunk, got {:?}", other),
        }

        stage.process(&queued(2, false));
        match stage.flush() {
            StageOutcome::Emitted(chunk) => {
                assert_eq!(chunk.sequence(), 1);
                assert_eq!(chunk.offset(), Duration::from_millis(200));
                assert_eq!(chunk.frame_count(), 1);
            }
            other => panic!("expected flushed chunk, got {:?}", other),
        }
    }

    #[test]
    fn test_three_consecutive_failures_are_fatal() {
        let mut stage = stage(1);
        assert!(matches!(stage.process(&queued(0, false)), StageOutcome::Emitted(_)));
        assert!(matches!(
            stage.process(&queued(1, true)),
            StageOutcome::Failed { consecutive: 1, .. }
        ));
        assert!(matches!(
            stage.process(&queued(2, true)),
            StageOutcome::Failed { consecutive: 2, .. }
        ));
        assert!(matches!(
            stage.process(&queued(3, true)),
            StageOutcome::Fatal { consecutive: 3, .. }
        ));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut stage = stage(1);
        stage.process(&queued(0, true));
        stage.process(&queued(1, true));
        assert!(matches!(stage.process(&queued(2, false)), StageOutcome::Emitted(_)));
        assert!(matches!(
            stage.process(&queued(3, true)),
            StageOutcome::Failed { consecutive: 1, .. }
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn prop_sequences_are_gap_free(
            batch in 1usize..4,
            failures in proptest::collection::vec(proptest::bool::weighted(0.3), 1..120),
        ) {
            let mut stage = stage(batch);
            let mut sequences = Vec::new();
            let mut streak = 0u32;
            let mut fatal = false;

            for (i, fail) in failures.iter().enumerate() {
                match stage.process(&queued(i as u64, *fail)) {
                    StageOutcome::Emitted(chunk) => {
                        prop_assert!(!*fail);
                        sequences.push(chunk.sequence());
                        streak = 0;
                    }
                    StageOutcome::Buffered => {
                        prop_assert!(!*fail);
                        streak = 0;
                    }
                    StageOutcome::Failed { consecutive, .. } => {
                        streak += 1;
                        prop_assert_eq!(consecutive, streak);
                        prop_assert!(streak < 3);
                    }
                    StageOutcome::Fatal { consecutive, .. } => {
                        prop_assert_eq!(consecutive, 3);
                        fatal = true;
                        break;
                    }
                }
            }

            if !fatal {
                if let StageOutcome::Emitted(chunk) = stage.flush() {
                    sequences.push(chunk.sequence());
                }
            }

            let expected: Vec<u64> = (0..sequences.len() as u64).collect();
            prop_assert_eq!(sequences, expected);
        }
    }
}
