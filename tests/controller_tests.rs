// End-to-end tests for the session controller, driven by a file-replay
// audio backend, a collecting upload sink, and a scripted event stream.

use anyhow::Result;
use async_trait::async_trait;
use lectio::audio::{AudioBackendConfig, AudioBackendFactory, AudioSegment, AudioSource};
use lectio::session::{LectureSession, RecordingState, SessionConfig};
use lectio::socket::LectureEvent;
use lectio::upload::ChunkSink;
use lectio::SessionError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct CollectingSink {
    segments: Mutex<Vec<AudioSegment>>,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            segments: Mutex::new(Vec::new()),
        }
    }

    fn count(&self) -> usize {
        self.segments.lock().unwrap().len()
    }
}

#[async_trait]
impl ChunkSink for CollectingSink {
    async fn submit(&self, _lecture_id: &str, segment: &AudioSegment) -> Result<()> {
        self.segments.lock().unwrap().push(segment.clone());
        Ok(())
    }
}

/// Write a silent 16kHz mono WAV of the given length
fn write_wav(path: &Path, seconds: u64) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..(seconds * 16000) {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

struct Harness {
    session: LectureSession,
    sink: Arc<CollectingSink>,
    event_tx: mpsc::Sender<LectureEvent>,
    _dir: TempDir,
}

fn harness(title: &str, wav_seconds: u64, connected: bool) -> Result<Harness> {
    let dir = TempDir::new()?;
    let wav_path = dir.path().join("input.wav");
    write_wav(&wav_path, wav_seconds)?;

    let backend = AudioBackendFactory::create(
        AudioSource::File(wav_path.display().to_string()),
        AudioBackendConfig::default(),
    )?;

    let sink = Arc::new(CollectingSink::new());
    let (event_tx, event_rx) = mpsc::channel(64);

    let config = SessionConfig {
        lecture_id: "lec-test".to_string(),
        title: title.to_string(),
        segment_duration: Duration::from_secs(20),
        ..SessionConfig::default()
    };

    let session =
        LectureSession::from_parts(config, sink.clone(), backend, event_rx, connected);

    Ok(Harness {
        session,
        sink,
        event_tx,
        _dir: dir,
    })
}

fn event(json: &str) -> LectureEvent {
    serde_json::from_str(json).expect("event should parse")
}

/// Poll the session snapshot every 10ms, up to 5 seconds
async fn wait_for_snapshot(
    session: &LectureSession,
    pred: impl Fn(&lectio::session::SessionState) -> bool,
) {
    for _ in 0..500 {
        if pred(&session.snapshot().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("snapshot condition not reached within 5 seconds");
}

/// Poll the sink every 10ms until it has collected `n` segments
async fn wait_for_segments(sink: &CollectingSink, n: usize) {
    for _ in 0..500 {
        if sink.count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sink never reached {} segments", n);
}

#[tokio::test]
async fn full_session_uploads_segments_and_exports_notes() -> Result<()> {
    let h = harness("Lecture 3", 45, true)?;

    h.session.start().await?;
    assert_eq!(
        h.session.snapshot().await.recording,
        RecordingState::Recording
    );

    // Backend pushes a transcription while recording
    h.event_tx
        .send(event(
            r#"{"type":"transcription","content":"Hello","importance":0.9}"#,
        ))
        .await?;
    wait_for_snapshot(&h.session, |s| s.transcriptions.len() == 1).await;

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.transcriptions[0].text, "Hello");
    assert!(snapshot.transcriptions[0].important);

    // 45 seconds of audio at 20s segments: 2 full + 1 flushed tail.
    // The file replay ends on its own, which flushes the tail.
    wait_for_segments(&h.sink, 3).await;

    let stats = h.session.stop().await?;
    assert_eq!(stats.submitted, 3);
    assert_eq!(stats.uploaded, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(h.sink.count(), 3);

    // Final notes arrive after stop
    h.event_tx
        .send(event(
            r##"{"type":"final_notes","title":"Lecture 3","markdown":"# Notes"}"##,
        ))
        .await?;
    wait_for_snapshot(&h.session, |s| s.final_notes.is_some()).await;

    let out_dir = TempDir::new()?;
    let path = h.session.download(out_dir.path()).await?;
    assert!(path.ends_with("Lecture 3-notes.md"));

    let contents = std::fs::read_to_string(&path)?;
    assert_eq!(contents, "# Notes");

    h.session.close().await;
    Ok(())
}

#[tokio::test]
async fn download_without_final_notes_is_rejected() -> Result<()> {
    let h = harness("Empty", 1, true)?;

    let out_dir = TempDir::new()?;
    let err = h.session.download(out_dir.path()).await.unwrap_err();
    assert!(matches!(err, SessionError::NothingToExport));

    // and no file was written
    assert!(std::fs::read_dir(out_dir.path())?.next().is_none());
    Ok(())
}

#[tokio::test]
async fn start_is_refused_while_disconnected() -> Result<()> {
    let h = harness("Offline", 1, false)?;

    let err = h.session.start().await.unwrap_err();
    assert!(matches!(err, SessionError::ConnectionFailure(_)));
    assert_eq!(h.session.snapshot().await.recording, RecordingState::Idle);
    Ok(())
}

#[tokio::test]
async fn stop_before_start_is_an_invalid_transition() -> Result<()> {
    let h = harness("Idle", 1, true)?;

    let err = h.session.stop().await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidTransition { .. }));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn elapsed_timer_freezes_while_paused() -> Result<()> {
    let h = harness("Timed", 1, true)?;

    h.session.start().await?;
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(h.session.snapshot().await.elapsed_secs, 3);

    h.session.pause().await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        h.session.snapshot().await.elapsed_secs,
        3,
        "paused time must not count"
    );

    h.session.resume().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.session.snapshot().await.elapsed_secs, 5);

    h.session.stop().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.session.snapshot().await.elapsed_secs, 5);

    Ok(())
}

#[tokio::test]
async fn save_without_final_notes_is_rejected() -> Result<()> {
    let h = harness("Unsaved", 1, true)?;

    let err = h.session.save().await.unwrap_err();
    assert!(matches!(err, SessionError::NothingToExport));
    Ok(())
}

#[tokio::test]
async fn close_is_idempotent() -> Result<()> {
    let h = harness("Closing", 1, true)?;

    h.session.close().await;
    h.session.close().await;
    Ok(())
}

#[tokio::test]
async fn configured_file_source_replays_instead_of_capturing() -> Result<()> {
    let dir = TempDir::new()?;
    let wav_path = dir.path().join("replay.wav");
    write_wav(&wav_path, 2)?;

    let config = SessionConfig {
        audio_source: AudioSource::File(wav_path.display().to_string()),
        ..SessionConfig::default()
    };
    assert!(matches!(
        SessionConfig::default().audio_source,
        AudioSource::Microphone
    ));

    let mut backend =
        AudioBackendFactory::create(config.audio_source.clone(), AudioBackendConfig::default())?;
    assert_eq!(backend.name(), "file replay");

    let mut frames = backend.start().await?;
    let mut samples = 0usize;
    while let Some(frame) = frames.recv().await {
        samples += frame.samples.len();
    }
    assert_eq!(samples, 2 * 16000);
    Ok(())
}
