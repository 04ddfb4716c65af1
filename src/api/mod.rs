//! Backend HTTP API collaborators
//!
//! Thin typed wrappers over the lecture backend's REST endpoints. Business
//! logic (transcription, note synthesis, persistence) lives server-side;
//! this module only reads and submits.

pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{Envelope, NoteSummary, Subject};
