use serde::{Deserialize, Serialize};

/// Inbound event pushed by the backend over the lecture WebSocket.
///
/// Tagged by the `type` field. Unknown types deserialize to `Unknown` and
/// are logged and ignored, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LectureEvent {
    /// Real-time transcription for one uploaded segment
    Transcription(TranscriptionPayload),

    /// Periodic cumulative re-summarization (roughly every 60s)
    StructuredNotes(StructuredNotesPayload),

    /// Terminal synthesized document, produced after recording stops
    FinalNotes(FinalNotes),

    /// Backend-reported error, surfaced as a transient notification
    Error(ErrorPayload),

    /// Forward-compatibility arm for message types this client predates
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionPayload {
    /// Transcribed text (the backend sends `content`, not `text`)
    pub content: String,

    /// Optional per-segment annotation produced by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_notes: Option<String>,

    /// Importance score in [0, 1]
    #[serde(default)]
    pub importance: f32,

    /// Upload sequence the backend attributes this text to, when it says
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<u64>,

    /// Backend timestamp (RFC3339), if provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredNotesPayload {
    /// Cumulative notes so far (markdown)
    pub content: String,

    /// How many transcriptions contributed to this snapshot
    #[serde(default)]
    pub transcription_count: usize,
}

/// The one-time synthesized notes document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalNotes {
    #[serde(default)]
    pub title: String,

    /// Full document body
    #[serde(default)]
    pub markdown: String,

    /// Section list, shape owned by the backend
    #[serde(default)]
    pub sections: serde_json::Value,

    /// Glossary entries, shape owned by the backend
    #[serde(default)]
    pub glossary: serde_json::Value,

    #[serde(default)]
    pub key_takeaways: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
}

/// Client-initiated signals pushed to the backend.
///
/// Advisory/telemetry only: local recording is controlled by the capture
/// lifecycle, not by these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    StartRecording { lecture_id: String },
    StopRecording,
}
