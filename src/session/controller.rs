use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::state::SessionState;
use crate::api::ApiClient;
use crate::audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, SegmentConfig, SegmentRecorder,
    SegmentSummary,
};
use crate::error::SessionError;
use crate::socket::{ClientCommand, ConnectionState, LectureEvent, LectureSocket};
use crate::upload::{ChunkSink, ChunkUploader, HttpChunkSink, UploadStats};

/// Orchestrates one live lecture session.
///
/// Owns the event socket, the capture pipeline, the upload pool and the
/// session state. The presentation layer issues commands here and reads
/// state snapshots; it never mutates state directly.
pub struct LectureSession {
    config: SessionConfig,
    api: Option<Arc<ApiClient>>,
    sink: Arc<dyn ChunkSink>,
    state: Arc<Mutex<SessionState>>,
    socket: Mutex<Option<LectureSocket>>,
    backend: Mutex<Option<Box<dyn AudioBackend>>>,
    uploader: Mutex<Option<ChunkUploader>>,
    paused: Arc<AtomicBool>,
    capture_task: Mutex<Option<JoinHandle<Result<Vec<SegmentSummary>>>>>,
    pipeline_tasks: Mutex<Vec<JoinHandle<()>>>,
    timer_task: Mutex<Option<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl LectureSession {
    /// Connect to the backend and assemble a session ready to start.
    ///
    /// Opens the lecture's WebSocket (bounded by the configured timeout)
    /// and prepares microphone capture; recording does not begin until
    /// [`LectureSession::start`].
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let api = Arc::new(ApiClient::new(
            &config.api_base_url,
            &config.auth_token,
            Duration::from_secs(30),
        )?);

        let (socket, events) =
            LectureSocket::connect(&config.ws_base_url, &config.lecture_id, config.connect_timeout)
                .await
                .context("Failed to open lecture event stream")?;

        let backend = AudioBackendFactory::create(
            config.audio_source.clone(),
            AudioBackendConfig {
                target_sample_rate: config.sample_rate,
                target_channels: config.channels,
                buffer_duration_ms: 100,
            },
        )?;

        let sink: Arc<dyn ChunkSink> = Arc::new(HttpChunkSink::new(Arc::clone(&api)));

        let session = Self::assemble(config, Some(api), sink, backend, events, Some(socket));
        Ok(session)
    }

    /// Assemble a session from explicit parts.
    ///
    /// Used by tests and offline runs: any [`ChunkSink`], any
    /// [`AudioBackend`], and an already-classified event stream.
    pub fn from_parts(
        config: SessionConfig,
        sink: Arc<dyn ChunkSink>,
        backend: Box<dyn AudioBackend>,
        events: mpsc::Receiver<LectureEvent>,
        connected: bool,
    ) -> Self {
        let initial = if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        Self::assemble_with(config, None, sink, backend, events, None, initial)
    }

    fn assemble(
        config: SessionConfig,
        api: Option<Arc<ApiClient>>,
        sink: Arc<dyn ChunkSink>,
        backend: Box<dyn AudioBackend>,
        events: mpsc::Receiver<LectureEvent>,
        socket: Option<LectureSocket>,
    ) -> Self {
        Self::assemble_with(
            config,
            api,
            sink,
            backend,
            events,
            socket,
            ConnectionState::Connected,
        )
    }

    fn assemble_with(
        config: SessionConfig,
        api: Option<Arc<ApiClient>>,
        sink: Arc<dyn ChunkSink>,
        backend: Box<dyn AudioBackend>,
        mut events: mpsc::Receiver<LectureEvent>,
        socket: Option<LectureSocket>,
        initial_connection: ConnectionState,
    ) -> Self {
        let mut initial_state = SessionState::new();
        initial_state.set_connection(initial_connection);
        let state = Arc::new(Mutex::new(initial_state));

        // Fold inbound events into state as they arrive. Runs until the
        // socket reader ends, so late final_notes still land after stop.
        let event_state = Arc::clone(&state);
        let connection_handle = socket.as_ref().map(|s| s.connection_handle());
        let event_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                event_state.lock().await.apply(event);
            }

            // Stream ended: mirror the socket's terminal state
            let terminal = connection_handle
                .map(|h| *h.read().unwrap())
                .unwrap_or(ConnectionState::Disconnected);
            event_state.lock().await.set_connection(terminal);
            info!("Lecture event stream ended ({:?})", terminal);
        });

        // 1-second elapsed timer; only counts while Recording
        let timer_state = Arc::clone(&state);
        let timer_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await; // first tick completes immediately
            loop {
                interval.tick().await;
                timer_state.lock().await.tick();
            }
        });

        Self {
            config,
            api,
            sink,
            state,
            socket: Mutex::new(socket),
            backend: Mutex::new(Some(backend)),
            uploader: Mutex::new(None),
            paused: Arc::new(AtomicBool::new(false)),
            capture_task: Mutex::new(None),
            pipeline_tasks: Mutex::new(Vec::new()),
            timer_task: Mutex::new(Some(timer_task)),
            event_task: Mutex::new(Some(event_task)),
        }
    }

    /// Begin recording: acquire the microphone, start segmenting, start
    /// the upload pool, and signal the backend.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.state.lock().await.start()?;

        let frames_rx = {
            let mut backend = self.backend.lock().await;
            let backend = backend
                .as_mut()
                .ok_or_else(|| SessionError::DeviceUnavailable("capture already released".into()))?;

            backend
                .start()
                .await
                .map_err(|e| SessionError::DeviceUnavailable(e.to_string()))?
        };

        let uploader = ChunkUploader::start(
            self.config.lecture_id.clone(),
            Arc::clone(&self.sink),
            self.config.uploader.clone(),
        );

        // Gate frames on the pause flag, then fold them into segments and
        // hand each completed segment to the upload pool.
        let (gated_tx, gated_rx) = mpsc::channel(64);
        let (segment_tx, mut segment_rx) = mpsc::channel(8);

        let paused = Arc::clone(&self.paused);
        paused.store(false, Ordering::SeqCst);
        let gate_task = tokio::spawn(async move {
            let mut frames_rx = frames_rx;
            while let Some(frame) = frames_rx.recv().await {
                if paused.load(Ordering::SeqCst) {
                    continue; // paused audio is discarded, not buffered
                }
                if gated_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let uploader_handle = uploader.sender();
        let forward_task = tokio::spawn(async move {
            while let Some(segment) = segment_rx.recv().await {
                if let Err(e) = uploader_handle.submit(segment).await {
                    error!("Upload queue rejected segment: {}", e);
                    break;
                }
            }
        });

        let segment_config = SegmentConfig {
            segment_duration_secs: self.config.segment_duration.as_secs(),
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
        };
        let capture_task = tokio::spawn(async move {
            let mut recorder = SegmentRecorder::new(segment_config);
            recorder.record(gated_rx, segment_tx).await
        });

        *self.uploader.lock().await = Some(uploader);
        *self.capture_task.lock().await = Some(capture_task);
        self.pipeline_tasks
            .lock()
            .await
            .extend([gate_task, forward_task]);

        // Advisory signal; local recording is already underway
        self.send_command(ClientCommand::StartRecording {
            lecture_id: self.config.lecture_id.clone(),
        })
        .await;

        info!("Recording started for lecture {}", self.config.lecture_id);
        Ok(())
    }

    /// Pause capture; the elapsed timer freezes and no segments are cut
    pub async fn pause(&self) -> Result<(), SessionError> {
        self.state.lock().await.pause()?;
        self.paused.store(true, Ordering::SeqCst);
        info!("Recording paused");
        Ok(())
    }

    /// Resume capture after a pause
    pub async fn resume(&self) -> Result<(), SessionError> {
        self.state.lock().await.resume()?;
        self.paused.store(false, Ordering::SeqCst);
        info!("Recording resumed");
        Ok(())
    }

    /// Stop recording: release the microphone, flush the partial segment,
    /// wait out queued uploads, and ask the backend for final synthesis.
    ///
    /// The event stream stays open so final notes can still arrive.
    pub async fn stop(&self) -> Result<UploadStats, SessionError> {
        self.state.lock().await.stop()?;

        // Stopping the backend closes the frame channel; the recorder then
        // flushes its partial tail as a final shorter segment.
        if let Some(backend) = self.backend.lock().await.as_mut() {
            if let Err(e) = backend.stop().await {
                warn!("Audio backend stop failed: {}", e);
            }
        }

        if let Some(task) = self.capture_task.lock().await.take() {
            match task.await {
                Ok(Ok(summaries)) => {
                    info!("Capture finished: {} segments emitted", summaries.len())
                }
                Ok(Err(e)) => error!("Segment recorder failed: {}", e),
                Err(e) => error!("Capture task panicked: {}", e),
            }
        }

        for task in self.pipeline_tasks.lock().await.drain(..) {
            if task.await.is_err() {
                error!("Pipeline task panicked");
            }
        }

        // In-flight and queued uploads complete or fail on their own terms
        let stats = match self.uploader.lock().await.take() {
            Some(uploader) => uploader.shutdown().await,
            None => UploadStats {
                submitted: 0,
                uploaded: 0,
                failed: 0,
            },
        };

        if stats.failed > 0 {
            warn!(
                "{} of {} segments were dropped after retries",
                stats.failed, stats.submitted
            );
        }

        self.send_command(ClientCommand::StopRecording).await;

        info!(
            "Recording stopped ({} uploaded, {} failed)",
            stats.uploaded, stats.failed
        );
        Ok(stats)
    }

    /// Persist the final notes. Only reports success once the backend
    /// acknowledges the write.
    pub async fn save(&self) -> Result<(), SessionError> {
        let notes = {
            let state = self.state.lock().await;
            state.final_notes.clone().ok_or(SessionError::NothingToExport)?
        };

        let api = self
            .api
            .as_ref()
            .ok_or_else(|| SessionError::SaveFailed("no backend configured".into()))?;

        api.save_notes(&self.config.lecture_id, &notes)
            .await
            .map_err(|e| SessionError::SaveFailed(e.to_string()))
    }

    /// Export the final notes to `<title>-notes.md` in `dir`
    pub async fn download(&self, dir: &Path) -> Result<PathBuf, SessionError> {
        let markdown = {
            let state = self.state.lock().await;
            match &state.final_notes {
                Some(notes) => notes.markdown.clone(),
                None => return Err(SessionError::NothingToExport),
            }
        };

        let filename = format!("{}-notes.md", sanitize_title(&self.config.title));
        let path = dir.join(filename);

        tokio::fs::write(&path, markdown)
            .await
            .map_err(|e| SessionError::SaveFailed(format!("could not write export: {}", e)))?;

        info!("Final notes exported to {}", path.display());
        Ok(path)
    }

    /// Read-only snapshot of the current session state
    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Tear the session down: close the socket and stop background tasks.
    /// Call when leaving the lecture screen. Idempotent.
    pub async fn close(&self) {
        if let Some(mut socket) = self.socket.lock().await.take() {
            socket.close().await;
        }

        if let Some(task) = self.timer_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
        }

        self.state
            .lock()
            .await
            .set_connection(ConnectionState::Disconnected);
    }

    async fn send_command(&self, command: ClientCommand) {
        let socket = self.socket.lock().await;
        if let Some(socket) = socket.as_ref() {
            if let Err(e) = socket.send(&command).await {
                // Commands are telemetry; failure never gates recording
                warn!("Failed to send command to backend: {}", e);
            }
        }
    }
}

fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "lecture".to_string()
    } else {
        trimmed.to_string()
    }
}
