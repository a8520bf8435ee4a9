use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::amplitude::{self, AmplitudeMode};
use super::chunk::SinkContext;
use super::events::{EventBus, PipelineEvent};
use super::queue::{CloseReason, FrameQueue, Offer, QueuedFrame};
use super::session::{RecordingSession, SessionOutcome, SessionRecord, SessionSummary};
use super::state::{CaptureState, Transition};
use super::worker::{run_worker, EncodeStage, WorkerOutput};
use crate::audio::{AudioFrame, MicrophoneSource, SourceError, SourceEvent};
use crate::encoder::Encoder;
use crate::error::CaptureError;
use crate::sink::ChunkSink;
use crate::waveform::{AmplitudeSample, WaveformWriter};

/// Tuning for the capture pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frames that may wait for the encoder before the oldest is dropped
    pub queue_capacity: usize,
    /// How long `stop()` waits for queued frames to be encoded
    pub drain_timeout: Duration,
    /// Consecutive encode failures that end the session
    pub max_consecutive_failures: u32,
    pub amplitude_mode: AmplitudeMode,
    /// Buffered events per subscriber before it starts lagging
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 32,
            drain_timeout: Duration::from_secs(2),
            max_consecutive_failures: 3,
            amplitude_mode: AmplitudeMode::Rms,
            event_capacity: 256,
        }
    }
}

/// Per-session plumbing shared by the capture task and the encode worker
pub(crate) struct SessionLink {
    pub queue: FrameQueue,
    shutdown: watch::Sender<bool>,
}

impl SessionLink {
    fn new(queue_capacity: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            queue: FrameQueue::new(queue_capacity),
            shutdown,
        }
    }

    fn signal_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

struct Machine {
    state: CaptureState,
    session: Option<SessionRecord>,
    summary: Option<SessionSummary>,
}

/// State shared between the pipeline handle and its tasks
pub(crate) struct Shared {
    machine: Mutex<Machine>,
    waveform: Mutex<WaveformWriter>,
    events: EventBus,
    amplitude_mode: AmplitudeMode,
}

impl Shared {
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    async fn state(&self) -> CaptureState {
        self.machine.lock().await.state
    }

    async fn transition(&self, transition: Transition) -> Result<CaptureState, CaptureError> {
        let (from, to) = {
            let mut machine = self.machine.lock().await;
            let from = machine.state;
            let to = from.next(transition)?;
            machine.state = to;
            if transition == Transition::Start {
                // A new request discards the finished session
                machine.session = None;
                machine.summary = None;
            }
            (from, to)
        };
        self.events.emit(PipelineEvent::StateChanged { from, to });
        Ok(to)
    }

    /// Install a fresh session and move `Requesting → Recording`
    async fn begin(&self, record: SessionRecord) -> Result<RecordingSession, CaptureError> {
        let (from, view) = {
            let mut machine = self.machine.lock().await;
            let from = machine.state;
            let to = from.next(Transition::Grant)?;
            let view = record.view(to);
            machine.state = to;
            machine.session = Some(record);
            machine.summary = None;
            (from, view)
        };
        self.events.emit(PipelineEvent::StateChanged {
            from,
            to: view.state,
        });
        Ok(view)
    }

    /// Sample, account and enqueue one frame. Frames outside `Recording` are
    /// discarded, as are frames that carry no playable audio.
    async fn on_frame(&self, link: &SessionLink, frame: AudioFrame) {
        // Zero-length frames would repeat the next frame's offset
        if frame.duration().is_zero() {
            return;
        }

        let level = amplitude::measure(self.amplitude_mode, &frame.samples);
        let (index, offset) = {
            let mut machine = self.machine.lock().await;
            if machine.state != CaptureState::Recording {
                return;
            }
            match machine.session.as_mut() {
                Some(record) => record.admit(frame.duration(), level),
                None => return,
            }
        };

        self.waveform
            .lock()
            .await
            .push(AmplitudeSample::new(level, offset));

        let offer = link.queue.offer(QueuedFrame { index, offset, frame }).await;
        if let Offer::DroppedOldest { total_dropped } = offer {
            if let Some(record) = self.machine.lock().await.session.as_mut() {
                record.frames_dropped = total_dropped;
            }
            warn!(
                "Encoder falling behind: dropped oldest queued frame ({} total)",
                total_dropped
            );
            self.events.emit(PipelineEvent::FramesDropped {
                total: total_dropped,
            });
        }
    }

    pub async fn record_encode_error(&self, frame_index: Option<u64>, message: String) {
        if let Some(record) = self.machine.lock().await.session.as_mut() {
            record.encode_errors += 1;
        }
        self.events.emit(PipelineEvent::EncodeError {
            frame_index,
            message,
        });
    }

    pub async fn record_chunk(&self, sequence: u64, bytes: usize) {
        if let Some(record) = self.machine.lock().await.session.as_mut() {
            record.chunks_emitted += 1;
        }
        self.events.emit(PipelineEvent::ChunkEmitted { sequence, bytes });
    }

    /// Move the active session to `Stopped` and report its summary.
    ///
    /// Only the first call per session has an effect; later calls return the
    /// stored summary.
    pub async fn finalize(
        &self,
        link: &SessionLink,
        outcome: SessionOutcome,
        detail: Option<String>,
    ) -> Option<SessionSummary> {
        link.signal_shutdown();

        let (from, summary) = {
            let mut machine = self.machine.lock().await;
            if let Some(summary) = &machine.summary {
                return Some(summary.clone());
            }
            let from = machine.state;
            let to = from.next(Transition::Finish).ok()?;
            let summary = machine.session.as_ref()?.summarize(outcome, detail);
            machine.state = to;
            machine.summary = Some(summary.clone());
            (from, summary)
        };

        match summary.outcome {
            SessionOutcome::Completed => info!(
                "Session {} complete: {:.1}s, {} chunks, {} frames dropped",
                summary.session_id, summary.duration_secs, summary.chunk_count, summary.frames_dropped
            ),
            outcome => warn!(
                "Session {} ended with {:?}: {:.1}s, {} chunks ({})",
                summary.session_id,
                outcome,
                summary.duration_secs,
                summary.chunk_count,
                summary.detail.as_deref().unwrap_or("no detail")
            ),
        }

        self.events.emit(PipelineEvent::StateChanged {
            from,
            to: CaptureState::Stopped,
        });
        self.events.emit(PipelineEvent::SessionEnded(summary.clone()));
        Some(summary)
    }
}

/// Capture task: consumes source events until shutdown, end of input, or
/// stream loss.
async fn run_capture(
    shared: Arc<Shared>,
    link: Arc<SessionLink>,
    mut events: mpsc::Receiver<SourceEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            event = events.recv() => match event {
                Some(SourceEvent::Frame(frame)) => shared.on_frame(&link, frame).await,
                Some(SourceEvent::EndOfInput) => {
                    info!("Source reached end of input");
                    link.queue.close(CloseReason::Finished).await;
                    break;
                }
                Some(SourceEvent::DeviceLost(reason)) => {
                    warn!("Microphone lost: {}", reason);
                    link.queue.close(CloseReason::Interrupted(reason)).await;
                    break;
                }
                None => {
                    warn!("Microphone stream ended unexpectedly");
                    link.queue
                        .close(CloseReason::Interrupted("microphone stream ended".to_string()))
                        .await;
                    break;
                }
            },
        }
    }
}

/// Real-time capture and encode pipeline
///
/// Collaborators are injected at construction: the microphone source, the
/// encoder, the chunk sink, and the writer half of the waveform buffer. The
/// reader half stays with the rendering side.
pub struct CapturePipeline {
    config: PipelineConfig,
    shared: Arc<Shared>,
    source: Mutex<Box<dyn MicrophoneSource>>,
    /// Encoder and sink while no worker owns them
    resources: Mutex<Option<WorkerOutput>>,
    link: Mutex<Option<Arc<SessionLink>>>,
    capture_task: Mutex<Option<JoinHandle<()>>>,
    worker_task: Mutex<Option<JoinHandle<WorkerOutput>>>,
    /// Serializes start/stop
    lifecycle: Mutex<()>,
}

impl CapturePipeline {
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn MicrophoneSource>,
        encoder: Box<dyn Encoder>,
        sink: Box<dyn ChunkSink>,
        waveform: WaveformWriter,
    ) -> Self {
        let shared = Arc::new(Shared {
            machine: Mutex::new(Machine {
                state: CaptureState::Idle,
                session: None,
                summary: None,
            }),
            waveform: Mutex::new(waveform),
            events: EventBus::new(config.event_capacity),
            amplitude_mode: config.amplitude_mode,
        });

        Self {
            config,
            shared,
            source: Mutex::new(source),
            resources: Mutex::new(Some(WorkerOutput { encoder, sink })),
            link: Mutex::new(None),
            capture_task: Mutex::new(None),
            worker_task: Mutex::new(None),
            lifecycle: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> CaptureState {
        self.shared.state().await
    }

    /// Current (or last finished) session
    pub async fn session(&self) -> Option<RecordingSession> {
        let machine = self.shared.machine.lock().await;
        machine.session.as_ref().map(|record| record.view(machine.state))
    }

    /// Summary of the last finished session
    pub async fn summary(&self) -> Option<SessionSummary> {
        self.shared.machine.lock().await.summary.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    pub async fn waveform_capacity(&self) -> usize {
        self.shared.waveform.lock().await.capacity()
    }

    pub async fn resize_waveform(&self, capacity: usize) {
        self.shared.waveform.lock().await.resize(capacity);
    }

    /// Request the microphone and begin a new session
    pub async fn start(&self) -> Result<RecordingSession, CaptureError> {
        let _guard = self.lifecycle.lock().await;

        let state = self.shared.state().await;
        state.next(Transition::Start)?;
        if state == CaptureState::Stopped {
            self.shutdown_session().await;
        }

        self.shared.transition(Transition::Start).await?;
        let WorkerOutput { encoder, mut sink } = match self.take_resources().await {
            Ok(resources) => resources,
            Err(e) => {
                self.shared.transition(Transition::Deny).await?;
                return Err(e);
            }
        };

        let source_name = self.source.lock().await.name().to_string();
        info!("Requesting microphone access from {} source", source_name);

        let started = self.source.lock().await.start().await;
        let stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                *self.resources.lock().await = Some(WorkerOutput { encoder, sink });
                self.shared.transition(Transition::Deny).await?;
                return Err(match e {
                    SourceError::PermissionDenied => {
                        warn!("Microphone permission denied");
                        self.shared.events.emit(PipelineEvent::PermissionDenied);
                        CaptureError::PermissionDenied
                    }
                    SourceError::Unavailable(why) => {
                        error!("Failed to start {} source: {}", source_name, why);
                        CaptureError::Source(why)
                    }
                });
            }
        };

        let format = stream.format;
        let record = SessionRecord::new(format);
        let context = SinkContext {
            session_id: record.id.clone(),
            format,
            codec: encoder.codec().to_string(),
            extension: encoder.file_extension().to_string(),
        };

        if let Err(e) = sink.open(&context).await {
            error!("Failed to open sink: {:#}", e);
            if let Err(stop_err) = self.source.lock().await.stop().await {
                error!("Failed to stop source: {:#}", stop_err);
            }
            *self.resources.lock().await = Some(WorkerOutput { encoder, sink });
            self.shared.transition(Transition::Deny).await?;
            return Err(CaptureError::Sink(format!("{:#}", e)));
        }

        let stage = EncodeStage::new(encoder, format, self.config.max_consecutive_failures);
        self.shared.waveform.lock().await.clear();
        let session = self.shared.begin(record).await?;

        let link = Arc::new(SessionLink::new(self.config.queue_capacity));
        let capture = tokio::spawn(run_capture(
            Arc::clone(&self.shared),
            Arc::clone(&link),
            stream.events,
            link.shutdown.subscribe(),
        ));
        let worker = tokio::spawn(run_worker(
            Arc::clone(&self.shared),
            Arc::clone(&link),
            stage,
            sink,
        ));

        *self.link.lock().await = Some(link);
        *self.capture_task.lock().await = Some(capture);
        *self.worker_task.lock().await = Some(worker);

        info!(
            "Recording session {} started: {}Hz, {} channels",
            session.id, session.sample_rate, session.channels
        );

        Ok(session)
    }

    pub async fn pause(&self) -> Result<(), CaptureError> {
        self.shared.transition(Transition::Pause).await?;
        info!("Recording paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), CaptureError> {
        self.shared.transition(Transition::Resume).await?;
        info!("Recording resumed");
        Ok(())
    }

    /// Finish the session: drain and flush the encoder, then report the
    /// summary. Calling it again after the session stopped returns the same
    /// summary.
    pub async fn stop(&self) -> Result<SessionSummary, CaptureError> {
        let _guard = self.lifecycle.lock().await;

        let state = self.shared.state().await;
        if state != CaptureState::Stopped {
            state.next(Transition::Finish)?;
            info!("Stopping recording session");
        }

        self.shutdown_session().await;

        self.summary()
            .await
            .ok_or(CaptureError::InvalidStateTransition { op: "stop", state })
    }

    /// Tear down the session tasks. Safe to call repeatedly.
    async fn shutdown_session(&self) {
        // Without a link the session is already torn down; a worker left
        // behind by a drain timeout is reclaimed by the next start
        let Some(link) = self.link.lock().await.take() else {
            return;
        };

        link.signal_shutdown();

        let capture = self.capture_task.lock().await.take();
        if let Some(task) = capture {
            if let Err(e) = task.await {
                error!("Capture task panicked: {}", e);
            }
        }

        link.queue.close(CloseReason::Finished).await;

        if let Err(e) = self.source.lock().await.stop().await {
            error!("Failed to stop source: {:#}", e);
        }

        let worker = self.worker_task.lock().await.take();
        if let Some(mut task) = worker {
            match tokio::time::timeout(self.config.drain_timeout, &mut task).await {
                Ok(Ok(output)) => *self.resources.lock().await = Some(output),
                Ok(Err(e)) => error!("Encode worker panicked: {}", e),
                Err(_) => {
                    warn!(
                        "Encode queue did not drain within {:?}, finalizing with partial data",
                        self.config.drain_timeout
                    );
                    link.queue.cancel().await;
                    let detail = CaptureError::DrainTimeout(self.config.drain_timeout).to_string();
                    self.shared
                        .finalize(&link, SessionOutcome::DrainTimeout, Some(detail))
                        .await;
                    // Reclaimed by the next start once it finishes its current chunk
                    *self.worker_task.lock().await = Some(task);
                }
            }
        }

        self.shared
            .finalize(&link, SessionOutcome::Completed, None)
            .await;
    }

    /// Get the encoder and sink back, waiting for a worker left behind by a
    /// drain timeout if needed.
    async fn take_resources(&self) -> Result<WorkerOutput, CaptureError> {
        if let Some(resources) = self.resources.lock().await.take() {
            return Ok(resources);
        }

        let Some(mut task) = self.worker_task.lock().await.take() else {
            return Err(CaptureError::EncoderBusy);
        };

        match tokio::time::timeout(self.config.drain_timeout, &mut task).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                error!("Encode worker panicked: {}", e);
                Err(CaptureError::EncoderBusy)
            }
            Err(_) => {
                warn!(
                    "Previous encode worker still busy after {:?}",
                    self.config.drain_timeout
                );
                *self.worker_task.lock().await = Some(task);
                Err(CaptureError::EncoderBusy)
            }
        }
    }
}
