//! Live lecture session management
//!
//! This module provides the session core: the recording state machine and
//! note collections (`state`), the per-session settings (`config`), and
//! the `LectureSession` controller that wires microphone capture, segment
//! uploads and the lecture event stream together.

pub mod config;
pub mod controller;
pub mod state;

pub use config::SessionConfig;
pub use controller::LectureSession;
pub use state::{
    EnhancedNote, RecordingState, SessionState, StructuredNote, TranscriptionEntry,
};
