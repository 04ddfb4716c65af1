pub mod backend;
pub mod file;
pub mod mic;
pub mod segment;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::{AudioFile, FileBackend};
pub use mic::MicBackend;
pub use segment::{AudioSegment, SegmentConfig, SegmentRecorder, SegmentSummary};
