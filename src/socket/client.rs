use anyhow::{Context, Result};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use super::messages::{ClientCommand, LectureEvent};

type WsSink =
    SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, tungstenite::Message>;

/// Connection state of the lecture event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Error,
}

/// One bidirectional event connection per lecture.
///
/// Inbound text frames are classified into [`LectureEvent`]s on the channel
/// returned by [`LectureSocket::connect`]; handling never blocks the read
/// loop. Outbound commands are advisory signals to the backend.
pub struct LectureSocket {
    lecture_id: String,
    state: Arc<RwLock<ConnectionState>>,
    sink: Option<Arc<Mutex<WsSink>>>,
    reader_task: Option<JoinHandle<()>>,
}

impl LectureSocket {
    /// Open the event connection for a lecture.
    ///
    /// Returns the socket and the receiver of classified events. The
    /// connection attempt is bounded by `connect_timeout`.
    pub async fn connect(
        ws_base: &str,
        lecture_id: &str,
        connect_timeout: Duration,
    ) -> Result<(Self, mpsc::Receiver<LectureEvent>)> {
        let url = format!("{}/ws/lecture/{}", ws_base.trim_end_matches('/'), lecture_id);
        info!("Connecting to lecture socket: {}", url);

        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| anyhow::anyhow!("connection attempt timed out after {:?}", connect_timeout))?
            .with_context(|| format!("Failed to connect to {}", url))?;

        info!("Lecture socket connected: {}", lecture_id);

        let (sink, mut stream) = ws_stream.split();

        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (event_tx, event_rx) = mpsc::channel::<LectureEvent>(256);

        let reader_state = Arc::clone(&state);
        let reader_lecture = lecture_id.to_string();

        let reader_task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(tungstenite::Message::Text(text)) => {
                        match serde_json::from_str::<LectureEvent>(&text) {
                            Ok(LectureEvent::Unknown) => {
                                warn!("Unknown lecture event type, ignoring: {}", text);
                            }
                            Ok(event) => {
                                if event_tx.send(event).await.is_err() {
                                    // Consumer gone, nothing left to do
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Unparseable lecture event, ignoring: {}", e);
                            }
                        }
                    }
                    Ok(tungstenite::Message::Close(_)) => {
                        info!("Lecture socket closed by server: {}", reader_lecture);
                        *reader_state.write().unwrap() = ConnectionState::Disconnected;
                        break;
                    }
                    // Pings are answered by the protocol layer; binary
                    // frames are not part of the lecture wire format
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Lecture socket error: {}", e);
                        *reader_state.write().unwrap() = ConnectionState::Error;
                        break;
                    }
                }
            }

            let mut state = reader_state.write().unwrap();
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Disconnected;
            }
        });

        Ok((
            Self {
                lecture_id: lecture_id.to_string(),
                state,
                sink: Some(Arc::new(Mutex::new(sink))),
                reader_task: Some(reader_task),
            },
            event_rx,
        ))
    }

    /// Current connection state snapshot
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read().unwrap()
    }

    /// Shared handle to the connection state, for observers that outlive
    /// a borrow of the socket
    pub fn connection_handle(&self) -> Arc<RwLock<ConnectionState>> {
        Arc::clone(&self.state)
    }

    pub fn lecture_id(&self) -> &str {
        &self.lecture_id
    }

    /// Push a client command to the backend.
    ///
    /// Failures are reported but must not gate local recording.
    pub async fn send(&self, command: &ClientCommand) -> Result<()> {
        let sink = self
            .sink
            .as_ref()
            .context("socket is not connected")?;

        let payload = serde_json::to_string(command)?;

        sink.lock()
            .await
            .send(tungstenite::Message::Text(payload.into()))
            .await
            .context("Failed to send command")?;

        Ok(())
    }

    /// Close the connection. Idempotent; safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(sink) = self.sink.take() {
            let _ = sink.lock().await.close().await;
        }

        if let Some(task) = self.reader_task.take() {
            // Reader ends on its own once the stream closes
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!("Lecture socket reader did not finish in time");
            }
        }

        *self.state.write().unwrap() = ConnectionState::Disconnected;
        info!("Lecture socket closed: {}", self.lecture_id);
    }
}
