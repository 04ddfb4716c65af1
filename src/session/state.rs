use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SessionError;
use crate::socket::{ConnectionState, FinalNotes, LectureEvent};

/// Importance score above which a transcription is flagged for the UI
const IMPORTANT_THRESHOLD: f32 = 0.7;

/// Recording lifecycle: idle → recording ⇄ paused → stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

/// One transcription event, appended in arrival order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionEntry {
    /// Backend chunk number when provided, otherwise a synthetic id
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub enhanced_notes: Option<String>,
    pub importance: f32,
    /// Derived: importance above the display threshold
    pub important: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedNote {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One cumulative structured-notes snapshot (not a delta)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredNote {
    pub id: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
    pub transcription_count: usize,
}

/// Authoritative in-memory model of one live lecture session.
///
/// Mutated only by the session controller, in response to a user command
/// or a classified socket event; the presentation layer reads clones.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub recording: RecordingState,
    pub connection: ConnectionState,
    /// Whole seconds spent in `Recording`; monotonic, never reset
    pub elapsed_secs: u64,
    pub transcriptions: Vec<TranscriptionEntry>,
    pub enhanced_notes: Vec<EnhancedNote>,
    pub structured_notes: Vec<StructuredNote>,
    /// Set at most once per session in the happy path; a duplicate event
    /// overwrites (last write wins)
    pub final_notes: Option<FinalNotes>,
    /// Most recent backend-reported error, for transient display
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            recording: RecordingState::Idle,
            connection: ConnectionState::Disconnected,
            elapsed_secs: 0,
            transcriptions: Vec::new(),
            enhanced_notes: Vec::new(),
            structured_notes: Vec::new(),
            final_notes: None,
            last_error: None,
        }
    }

    /// idle → recording; requires a live event connection
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.connection != ConnectionState::Connected {
            return Err(SessionError::ConnectionFailure(
                "cannot start without a connected lecture socket".into(),
            ));
        }
        match self.recording {
            RecordingState::Idle => {
                self.recording = RecordingState::Recording;
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                command: "start",
                state,
            }),
        }
    }

    /// recording → paused
    pub fn pause(&mut self) -> Result<(), SessionError> {
        match self.recording {
            RecordingState::Recording => {
                self.recording = RecordingState::Paused;
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                command: "pause",
                state,
            }),
        }
    }

    /// paused → recording
    pub fn resume(&mut self) -> Result<(), SessionError> {
        match self.recording {
            RecordingState::Paused => {
                self.recording = RecordingState::Recording;
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                command: "resume",
                state,
            }),
        }
    }

    /// recording|paused → stopped. Terminal for capture; the socket may
    /// still deliver final notes afterward.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        match self.recording {
            RecordingState::Recording | RecordingState::Paused => {
                self.recording = RecordingState::Stopped;
                Ok(())
            }
            state => Err(SessionError::InvalidTransition {
                command: "stop",
                state,
            }),
        }
    }

    /// One timer tick; counts only while actively recording
    pub fn tick(&mut self) {
        if self.recording == RecordingState::Recording {
            self.elapsed_secs += 1;
        }
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
    }

    /// Fold one classified socket event into the session.
    ///
    /// Must stay valid in every recording state: final notes routinely
    /// arrive after `stop`.
    pub fn apply(&mut self, event: LectureEvent) {
        match event {
            LectureEvent::Transcription(payload) => {
                let id = payload
                    .chunk_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                if let Some(enhanced) = &payload.enhanced_notes {
                    self.enhanced_notes.push(EnhancedNote {
                        id: uuid::Uuid::new_v4().to_string(),
                        content: enhanced.clone(),
                        timestamp: payload.timestamp.clone(),
                    });
                }

                self.transcriptions.push(TranscriptionEntry {
                    id,
                    text: payload.content,
                    enhanced_notes: payload.enhanced_notes,
                    importance: payload.importance,
                    important: payload.importance > IMPORTANT_THRESHOLD,
                    timestamp: payload.timestamp,
                });
            }

            LectureEvent::StructuredNotes(payload) => {
                self.structured_notes.push(StructuredNote {
                    id: uuid::Uuid::new_v4().to_string(),
                    content: payload.content,
                    received_at: Utc::now(),
                    transcription_count: payload.transcription_count,
                });
            }

            LectureEvent::FinalNotes(notes) => {
                if self.final_notes.is_some() {
                    warn!("Final notes received again, replacing previous value");
                }
                self.final_notes = Some(notes);
            }

            LectureEvent::Error(payload) => {
                warn!("Backend error event: {}", payload.message);
                self.last_error = Some(payload.message);
            }

            LectureEvent::Unknown => {
                warn!("Ignoring unknown lecture event type");
            }
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
