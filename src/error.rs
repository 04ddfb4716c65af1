//! Error taxonomy for session operations.

use crate::session::RecordingState;
use thiserror::Error;

/// Failures a session operation can surface to the caller.
///
/// Transient per-segment upload trouble is retried inside the uploader
/// and reported through `UploadStats`; only failures that abort an
/// operation outright land here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("lecture socket unavailable: {0}")]
    ConnectionFailure(String),

    #[error("upload failed: {0}")]
    UploadFailure(String),

    #[error("cannot {command} while {state:?}")]
    InvalidTransition {
        command: &'static str,
        state: RecordingState,
    },

    #[error("no final notes to export yet")]
    NothingToExport,

    #[error("saving notes failed: {0}")]
    SaveFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_command_and_state() {
        let err = SessionError::InvalidTransition {
            command: "pause",
            state: RecordingState::Idle,
        };
        assert_eq!(err.to_string(), "cannot pause while Idle");
    }
}
