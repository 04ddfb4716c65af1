pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod socket;
pub mod upload;

pub use api::{ApiClient, NoteSummary, Subject};
pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSegment,
    AudioSource, SegmentConfig, SegmentRecorder,
};
pub use config::Config;
pub use error::SessionError;
pub use session::{LectureSession, RecordingState, SessionConfig, SessionState};
pub use socket::{ClientCommand, ConnectionState, FinalNotes, LectureEvent, LectureSocket};
pub use upload::{ChunkSink, ChunkUploader, UploadStats, UploaderConfig};
