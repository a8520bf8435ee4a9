pub mod audio;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod error;
pub mod http;
pub mod sink;
pub mod waveform;

pub use audio::{
    AudioFile, AudioFrame, CaptureStream, FileSource, MicrophoneSource, SourceError, SourceEvent,
    SourceFactory, SourceKind, SourceSettings, StreamFormat, ToneSource,
};
pub use capture::{
    AmplitudeMode, AudioChunk, CapturePipeline, CaptureState, PipelineConfig, PipelineEvent,
    RecordingSession, SessionOutcome, SessionSummary, SinkContext,
};
pub use config::Config;
pub use encoder::{create_encoder, Codec, Encoder, PcmEncoder, WavEncoder};
pub use error::CaptureError;
pub use http::{create_router, AppState};
pub use sink::{create_sink, ChunkSink, DirectorySink, JsonLinesSink, MemorySink, SinkKind};
pub use waveform::{
    waveform_channel, AmplitudeSample, WaveformBuffer, WaveformReader, WaveformSnapshot,
    WaveformWriter,
};
