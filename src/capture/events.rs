use tokio::sync::broadcast;

use super::session::SessionSummary;
use super::state::CaptureState;

/// Notifications from the pipeline to observers
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateChanged {
        from: CaptureState,
        to: CaptureState,
    },
    /// `start()` was refused by the source
    PermissionDenied,
    /// One frame failed to encode; recording continues
    EncodeError { frame_index: Option<u64>, message: String },
    /// Backpressure evicted an unencoded frame
    FramesDropped { total: u64 },
    ChunkEmitted { sequence: u64, bytes: usize },
    /// The sink rejected a chunk; recording continues
    SinkError { sequence: u64, message: String },
    /// Reported exactly once per session
    SessionEnded(SessionSummary),
}

/// Fan-out of pipeline events
///
/// Backed by a broadcast channel: a slow subscriber lags and loses old
/// events rather than stalling capture.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}
