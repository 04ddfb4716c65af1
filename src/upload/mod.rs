//! Segment upload pipeline
//!
//! Each captured segment is submitted to the backend independently of the
//! event stream. Uploads run on a small worker pool with a bounded queue,
//! a cap on in-flight requests, and bounded retry with exponential backoff.
//! One segment failing permanently never blocks later segments.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::ApiClient;
use crate::audio::AudioSegment;

const BACKOFF_MAX_MS: u64 = 30_000;

/// Destination for uploaded segments. One call = one segment for one
/// lecture; calls are self-contained.
#[async_trait::async_trait]
pub trait ChunkSink: Send + Sync {
    async fn submit(&self, lecture_id: &str, segment: &AudioSegment) -> Result<()>;
}

/// Sink backed by `POST /api/audio/lecture/{id}/chunk`
pub struct HttpChunkSink {
    api: Arc<ApiClient>,
}

impl HttpChunkSink {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl ChunkSink for HttpChunkSink {
    async fn submit(&self, lecture_id: &str, segment: &AudioSegment) -> Result<()> {
        self.api
            .upload_chunk(lecture_id, segment.wav_bytes.clone())
            .await
    }
}

/// Uploader tuning
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploaderConfig {
    /// Maximum concurrent in-flight uploads
    pub max_in_flight: usize,
    /// Attempts per segment before giving up
    pub max_attempts: u32,
    /// Base backoff delay; doubles per failed attempt
    pub backoff_base_ms: u64,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Upload counters snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadStats {
    pub submitted: usize,
    pub uploaded: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicUsize,
    uploaded: AtomicUsize,
    failed: AtomicUsize,
}

/// Bounded worker pool that drains a segment queue into a [`ChunkSink`]
pub struct ChunkUploader {
    queue_tx: mpsc::Sender<AudioSegment>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl ChunkUploader {
    /// Start the pool. Workers run until [`ChunkUploader::shutdown`].
    pub fn start(lecture_id: String, sink: Arc<dyn ChunkSink>, config: UploaderConfig) -> Self {
        let worker_count = config.max_in_flight.max(1);

        // Small queue on top of the in-flight cap; submit applies
        // backpressure when the backend falls behind
        let (queue_tx, queue_rx) = mpsc::channel::<AudioSegment>(worker_count * 2);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let counters = Arc::new(Counters::default());

        let workers = (0..worker_count)
            .map(|worker_id| {
                let queue_rx = Arc::clone(&queue_rx);
                let sink = Arc::clone(&sink);
                let counters = Arc::clone(&counters);
                let lecture_id = lecture_id.clone();
                let config = config.clone();

                tokio::spawn(async move {
                    loop {
                        let segment = {
                            let mut rx = queue_rx.lock().await;
                            rx.recv().await
                        };

                        let Some(segment) = segment else {
                            break; // queue closed and drained
                        };

                        upload_with_retry(&*sink, &lecture_id, segment, &config, &counters)
                            .await;
                    }

                    info!("Upload worker {} finished", worker_id);
                })
            })
            .collect();

        info!(
            "Chunk uploader started for lecture {} ({} workers, {} attempts/segment)",
            lecture_id, worker_count, config.max_attempts
        );

        Self {
            queue_tx,
            workers,
            counters,
        }
    }

    /// Queue one segment. Waits when the queue is full (backpressure),
    /// fails only if the pool has shut down.
    pub async fn submit(&self, segment: AudioSegment) -> Result<()> {
        self.sender().submit(segment).await
    }

    /// Detached submit handle, usable from tasks that outlive a borrow
    /// of the uploader
    pub fn sender(&self) -> UploadHandle {
        UploadHandle {
            queue_tx: self.queue_tx.clone(),
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn stats(&self) -> UploadStats {
        UploadStats {
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            uploaded: self.counters.uploaded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    /// Close the queue and wait for queued and in-flight uploads to finish
    pub async fn shutdown(mut self) -> UploadStats {
        drop(self.queue_tx);

        for worker in self.workers.drain(..) {
            if worker.await.is_err() {
                error!("Upload worker panicked");
            }
        }

        UploadStats {
            submitted: self.counters.submitted.load(Ordering::SeqCst),
            uploaded: self.counters.uploaded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }
}

/// Cloneable handle for queueing segments into a running pool
#[derive(Clone)]
pub struct UploadHandle {
    queue_tx: mpsc::Sender<AudioSegment>,
    counters: Arc<Counters>,
}

impl UploadHandle {
    pub async fn submit(&self, segment: AudioSegment) -> Result<()> {
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        self.queue_tx
            .send(segment)
            .await
            .map_err(|_| anyhow::anyhow!("upload pool has shut down"))
    }
}

async fn upload_with_retry(
    sink: &dyn ChunkSink,
    lecture_id: &str,
    segment: AudioSegment,
    config: &UploaderConfig,
    counters: &Counters,
) {
    // A zero from config still gets one try so every segment is accounted for
    let max_attempts = config.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match sink.submit(lecture_id, &segment).await {
            Ok(()) => {
                counters.uploaded.fetch_add(1, Ordering::SeqCst);
                info!(
                    "Uploaded segment {} ({} bytes, attempt {})",
                    segment.index,
                    segment.wav_bytes.len(),
                    attempt
                );
                return;
            }
            Err(e) if attempt < max_attempts => {
                let delay = backoff_delay_ms(config.backoff_base_ms, attempt);
                warn!(
                    "Upload of segment {} failed (attempt {}/{}), retrying in {}ms: {}",
                    segment.index, attempt, max_attempts, delay, e
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    "Dropping segment {} after {} attempts: {}",
                    segment.index, max_attempts, e
                );
            }
        }
    }
}

fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let exp = attempt.saturating_sub(1).min(10);
    base_ms.saturating_mul(1 << exp).min(BACKOFF_MAX_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_delay_ms(500, 1), 500);
        assert_eq!(backoff_delay_ms(500, 2), 1000);
        assert_eq!(backoff_delay_ms(500, 3), 2000);
        assert_eq!(backoff_delay_ms(500, 10), BACKOFF_MAX_MS);
    }
}
