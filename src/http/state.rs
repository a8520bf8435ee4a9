use crate::capture::CapturePipeline;
use crate::waveform::WaveformReader;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The capture pipeline being controlled
    pub pipeline: Arc<CapturePipeline>,

    /// Render-side half of the waveform buffer (readers take turns; the
    /// capture side never touches this lock)
    pub waveform: Arc<Mutex<WaveformReader>>,
}

impl AppState {
    pub fn new(pipeline: Arc<CapturePipeline>, waveform: WaveformReader) -> Self {
        Self {
            pipeline,
            waveform: Arc::new(Mutex::new(waveform)),
        }
    }
}
