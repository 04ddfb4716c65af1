use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The backend wraps every response in a `{success, ...}` envelope
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLectureResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SubjectsResponse {
    pub success: bool,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// A persisted note, as listed in "My Notes". Owned entirely by the
/// backend; the client only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub markdown: Option<String>,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MyNotesResponse {
    pub success: bool,
    #[serde(default)]
    pub notes: Vec<NoteSummary>,
    #[serde(default)]
    pub count: usize,
}

fn default_true() -> bool {
    true
}
