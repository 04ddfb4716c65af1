use anyhow::{Context, Result};
use std::io::Cursor;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::AudioFrame;

/// Segmenting configuration
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Duration of each segment in seconds (default: 20)
    pub segment_duration_secs: u64,
    /// Sample rate of incoming frames
    pub sample_rate: u32,
    /// Channel count of incoming frames
    pub channels: u16,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: 20,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// One bounded-duration unit of captured audio, wrapped in a
/// self-contained playable WAV container
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Segment number (0-indexed)
    pub index: usize,
    /// Start time in milliseconds since capture started
    pub start_ms: u64,
    /// End time in milliseconds since capture started
    pub end_ms: u64,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Number of samples in this segment
    pub sample_count: usize,
    /// Complete WAV file bytes, ready to upload
    pub wav_bytes: Vec<u8>,
}

impl AudioSegment {
    /// Segment duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Folds an audio frame stream into fixed-duration, contiguous,
/// non-overlapping in-memory WAV segments.
///
/// Each completed segment is sent to `segment_tx` as soon as it closes;
/// when the frame stream ends, any buffered partial audio is flushed as a
/// final (possibly shorter) segment.
pub struct SegmentRecorder {
    config: SegmentConfig,
    current: Option<SegmentBuilder>,
    segment_index: usize,
}

impl SegmentRecorder {
    pub fn new(config: SegmentConfig) -> Self {
        info!(
            "Segment recorder initialized ({}s segments, {}Hz)",
            config.segment_duration_secs, config.sample_rate
        );

        Self {
            config,
            current: None,
            segment_index: 0,
        }
    }

    /// Consume frames until the channel closes, emitting completed segments.
    ///
    /// Returns the full list of emitted segments' metadata (without audio
    /// bytes) once the stream ends.
    pub async fn record(
        &mut self,
        mut audio_rx: mpsc::Receiver<AudioFrame>,
        segment_tx: mpsc::Sender<AudioSegment>,
    ) -> Result<Vec<SegmentSummary>> {
        let mut summaries = Vec::new();

        while let Some(frame) = audio_rx.recv().await {
            if self.should_close_current(&frame) {
                if let Some(builder) = self.current.take() {
                    let segment = builder.finish()?;
                    info!(
                        "Segment {} complete: {:.1}s - {:.1}s ({} samples)",
                        segment.index,
                        segment.start_ms as f64 / 1000.0,
                        segment.end_ms as f64 / 1000.0,
                        segment.sample_count
                    );
                    summaries.push(SegmentSummary::of(&segment));
                    if segment_tx.send(segment).await.is_err() {
                        anyhow::bail!("segment consumer dropped");
                    }
                }
            }

            if self.current.is_none() {
                self.current = Some(SegmentBuilder::new(
                    self.segment_index,
                    frame.timestamp_ms,
                    self.config.sample_rate,
                    self.config.channels,
                ));
                self.segment_index += 1;
            }

            if let Some(builder) = &mut self.current {
                builder.push_frame(&frame);
            }
        }

        // Flush the partial tail as a final, shorter segment
        if let Some(builder) = self.current.take() {
            let segment = builder.finish()?;
            info!(
                "Final segment {} flushed: {:.1}s - {:.1}s ({} samples)",
                segment.index,
                segment.start_ms as f64 / 1000.0,
                segment.end_ms as f64 / 1000.0,
                segment.sample_count
            );
            summaries.push(SegmentSummary::of(&segment));
            let _ = segment_tx.send(segment).await;
        }

        info!("Segmenting complete: {} segments emitted", summaries.len());

        Ok(summaries)
    }

    fn should_close_current(&self, frame: &AudioFrame) -> bool {
        match &self.current {
            None => false,
            Some(builder) => {
                let limit_ms = self.config.segment_duration_secs * 1000;
                frame.timestamp_ms.saturating_sub(builder.start_ms) >= limit_ms
            }
        }
    }
}

/// Metadata for an emitted segment (audio bytes excluded)
#[derive(Debug, Clone)]
pub struct SegmentSummary {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub sample_count: usize,
}

impl SegmentSummary {
    fn of(segment: &AudioSegment) -> Self {
        Self {
            index: segment.index,
            start_ms: segment.start_ms,
            end_ms: segment.end_ms,
            sample_count: segment.sample_count,
        }
    }
}

/// Accumulates frames for one segment, then encodes them as WAV
struct SegmentBuilder {
    index: usize,
    start_ms: u64,
    end_ms: u64,
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl SegmentBuilder {
    fn new(index: usize, start_ms: u64, sample_rate: u32, channels: u16) -> Self {
        Self {
            index,
            start_ms,
            end_ms: start_ms,
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    fn push_frame(&mut self, frame: &AudioFrame) {
        self.samples.extend_from_slice(&frame.samples);
        self.end_ms = frame.timestamp_ms + frame.duration_ms();
    }

    fn finish(self) -> Result<AudioSegment> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV")?;
        }

        Ok(AudioSegment {
            index: self.index,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample_count: self.samples.len(),
            wav_bytes: cursor.into_inner(),
        })
    }
}
