pub mod file;
pub mod source;
pub mod tone;

pub use file::{AudioFile, FileSource};
pub use source::{
    AudioFrame, CaptureStream, MicrophoneSource, SourceError, SourceEvent, SourceFactory,
    SourceKind, SourceSettings, StreamFormat,
};
pub use tone::ToneSource;
