// Tests for the session state machine and event folding rules

use lectio::session::{RecordingState, SessionState};
use lectio::socket::{ConnectionState, LectureEvent};
use lectio::SessionError;

fn connected_state() -> SessionState {
    let mut state = SessionState::new();
    state.set_connection(ConnectionState::Connected);
    state
}

fn event(json: &str) -> LectureEvent {
    serde_json::from_str(json).expect("event should parse")
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[test]
fn start_requires_connection() {
    let mut state = SessionState::new();
    assert!(matches!(
        state.start(),
        Err(SessionError::ConnectionFailure(_))
    ));
    assert_eq!(state.recording, RecordingState::Idle);

    state.set_connection(ConnectionState::Connected);
    state.start().unwrap();
    assert_eq!(state.recording, RecordingState::Recording);
}

#[test]
fn pause_only_valid_while_recording() {
    let mut state = connected_state();

    assert!(matches!(
        state.pause(),
        Err(SessionError::InvalidTransition { .. })
    ));

    state.start().unwrap();
    state.pause().unwrap();
    assert_eq!(state.recording, RecordingState::Paused);

    // pausing twice is invalid
    assert!(state.pause().is_err());
}

#[test]
fn resume_only_valid_while_paused() {
    let mut state = connected_state();
    state.start().unwrap();

    assert!(matches!(
        state.resume(),
        Err(SessionError::InvalidTransition { .. })
    ));

    state.pause().unwrap();
    state.resume().unwrap();
    assert_eq!(state.recording, RecordingState::Recording);
}

#[test]
fn stop_valid_from_recording_or_paused_never_idle() {
    let mut idle = connected_state();
    assert!(matches!(
        idle.stop(),
        Err(SessionError::InvalidTransition { .. })
    ));

    let mut recording = connected_state();
    recording.start().unwrap();
    recording.stop().unwrap();
    assert_eq!(recording.recording, RecordingState::Stopped);

    let mut paused = connected_state();
    paused.start().unwrap();
    paused.pause().unwrap();
    paused.stop().unwrap();
    assert_eq!(paused.recording, RecordingState::Stopped);
}

#[test]
fn elapsed_counts_only_while_recording() {
    let mut state = connected_state();

    state.tick();
    assert_eq!(state.elapsed_secs, 0, "idle must not count");

    state.start().unwrap();
    state.tick();
    state.tick();
    assert_eq!(state.elapsed_secs, 2);

    state.pause().unwrap();
    state.tick();
    assert_eq!(state.elapsed_secs, 2, "paused must freeze the counter");

    state.resume().unwrap();
    state.tick();
    assert_eq!(state.elapsed_secs, 3);

    state.stop().unwrap();
    state.tick();
    assert_eq!(state.elapsed_secs, 3, "stopped must freeze the counter");
}

// ---------------------------------------------------------------------------
// Event folding
// ---------------------------------------------------------------------------

#[test]
fn transcriptions_append_in_arrival_order() {
    let mut state = connected_state();

    for i in 0..5 {
        state.apply(event(&format!(
            r#"{{"type":"transcription","content":"line {}","importance":0.1}}"#,
            i
        )));
    }

    assert_eq!(state.transcriptions.len(), 5);
    for (i, entry) in state.transcriptions.iter().enumerate() {
        assert_eq!(entry.text, format!("line {}", i));
    }
}

#[test]
fn high_importance_sets_the_important_flag() {
    let mut state = connected_state();

    state.apply(event(
        r#"{"type":"transcription","content":"Hello","importance":0.9}"#,
    ));
    state.apply(event(
        r#"{"type":"transcription","content":"aside","importance":0.3}"#,
    ));

    assert!(state.transcriptions[0].important);
    assert!(!state.transcriptions[1].important);
}

#[test]
fn enhanced_notes_split_out_of_transcription_events() {
    let mut state = connected_state();

    state.apply(event(
        r#"{"type":"transcription","content":"raw text","enhanced_notes":"polished","importance":0.5}"#,
    ));
    state.apply(event(
        r#"{"type":"transcription","content":"plain","importance":0.5}"#,
    ));

    assert_eq!(state.transcriptions.len(), 2);
    assert_eq!(state.enhanced_notes.len(), 1);
    assert_eq!(state.enhanced_notes[0].content, "polished");
    assert_eq!(
        state.transcriptions[0].enhanced_notes.as_deref(),
        Some("polished")
    );
}

#[test]
fn structured_notes_accumulate_as_snapshots() {
    let mut state = connected_state();

    state.apply(event(
        r##"{"type":"structured_notes","content":"# First","transcription_count":3}"##,
    ));
    state.apply(event(
        r##"{"type":"structured_notes","content":"# First\n# Second","transcription_count":7}"##,
    ));

    assert_eq!(state.structured_notes.len(), 2);
    assert_eq!(state.structured_notes[1].transcription_count, 7);
}

#[test]
fn duplicate_final_notes_keeps_the_latest() {
    let mut state = connected_state();

    state.apply(event(
        r##"{"type":"final_notes","title":"v1","markdown":"# one"}"##,
    ));
    state.apply(event(
        r##"{"type":"final_notes","title":"v2","markdown":"# two"}"##,
    ));

    let notes = state.final_notes.as_ref().expect("final notes set");
    assert_eq!(notes.title, "v2");
    assert_eq!(notes.markdown, "# two");
}

#[test]
fn final_notes_still_land_after_stop() {
    let mut state = connected_state();
    state.start().unwrap();
    state.stop().unwrap();

    state.apply(event(
        r##"{"type":"final_notes","title":"Lecture","markdown":"# Notes"}"##,
    ));

    assert!(state.final_notes.is_some());
    assert_eq!(state.recording, RecordingState::Stopped);
}

#[test]
fn error_events_surface_without_changing_recording_state() {
    let mut state = connected_state();
    state.start().unwrap();

    state.apply(event(r#"{"type":"error","message":"stt backend overloaded"}"#));

    assert_eq!(state.last_error.as_deref(), Some("stt backend overloaded"));
    assert_eq!(state.recording, RecordingState::Recording);
}

#[test]
fn unknown_event_types_are_ignored() {
    let mut state = connected_state();
    let before = state.clone();

    state.apply(event(r#"{"type":"heartbeat","uptime":12}"#));

    assert_eq!(state.transcriptions.len(), before.transcriptions.len());
    assert!(state.final_notes.is_none());
    assert!(state.last_error.is_none());
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[test]
fn transcription_event_parses_backend_fields() {
    let parsed = event(
        r#"{
            "type": "transcription",
            "chunk_number": 4,
            "timestamp": "2026-08-29T10:15:00Z",
            "content": "The mitochondria is the powerhouse of the cell",
            "enhanced_notes": "Mitochondria: cellular energy production",
            "importance": 0.85
        }"#,
    );

    let LectureEvent::Transcription(payload) = parsed else {
        panic!("expected transcription event");
    };
    assert_eq!(payload.chunk_number, Some(4));
    assert!(payload.content.contains("mitochondria"));
    assert!((payload.importance - 0.85).abs() < f32::EPSILON);
}

#[test]
fn final_notes_event_tolerates_missing_fields() {
    let parsed = event(r##"{"type":"final_notes","markdown":"# Notes"}"##);

    let LectureEvent::FinalNotes(notes) = parsed else {
        panic!("expected final notes event");
    };
    assert_eq!(notes.markdown, "# Notes");
    assert!(notes.title.is_empty());
    assert!(notes.key_takeaways.is_empty());
}

#[test]
fn client_commands_serialize_with_type_tags() {
    use lectio::socket::ClientCommand;

    let start = serde_json::to_value(ClientCommand::StartRecording {
        lecture_id: "lec-42".into(),
    })
    .unwrap();
    assert_eq!(start["type"], "start_recording");
    assert_eq!(start["lecture_id"], "lec-42");

    let stop = serde_json::to_value(ClientCommand::StopRecording).unwrap();
    assert_eq!(stop["type"], "stop_recording");
}
