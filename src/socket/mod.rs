//! Per-lecture WebSocket event stream
//!
//! One connection per lecture id, path `/ws/lecture/{id}`. The backend
//! pushes transcription, structured-notes, final-notes and error events;
//! the client pushes advisory start/stop signals.

pub mod client;
pub mod messages;

pub use client::{ConnectionState, LectureSocket};
pub use messages::{
    ClientCommand, ErrorPayload, FinalNotes, LectureEvent, StructuredNotesPayload,
    TranscriptionPayload,
};
