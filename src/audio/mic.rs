use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

/// Microphone capture backend using cpal.
///
/// The cpal stream is not Send, so it lives on a dedicated thread for the
/// lifetime of the capture; samples cross to async land over channels.
pub struct MicBackend {
    config: AudioBackendConfig,
    capturing: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl MicBackend {
    pub fn new(config: AudioBackendConfig) -> Result<Self> {
        Ok(Self {
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(anyhow!("microphone capture already started"));
        }

        let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(64);
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(u32, u16)>>();

        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);

        let config = self.config.clone();

        let worker = std::thread::spawn(move || {
            run_capture_thread(config, capturing, frame_tx, ready_tx);
        });

        // Wait for the thread to open the device (or fail to)
        let (rate, channels) = tokio::task::spawn_blocking(move || {
            ready_rx
                .recv()
                .unwrap_or_else(|_| Err(anyhow!("capture thread exited before opening device")))
        })
        .await
        .context("capture startup task failed")??;

        info!("Microphone capture started: {}Hz, {} channel(s)", rate, channels);

        self.worker = Some(worker);
        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || {
                if worker.join().is_err() {
                    error!("Microphone capture thread panicked");
                }
            })
            .await
            .context("failed to join capture thread")?;
        }

        info!("Microphone capture stopped, device released");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone (cpal)"
    }
}

impl Drop for MicBackend {
    fn drop(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
    }
}

/// Owns the cpal stream; assembles raw callback samples into fixed-duration
/// frames at the target rate/channel count and forwards them.
fn run_capture_thread(
    config: AudioBackendConfig,
    capturing: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: std_mpsc::Sender<Result<(u32, u16)>>,
) {
    let (sample_tx, sample_rx) = std_mpsc::channel::<Vec<i16>>();

    let stream = match open_input_stream(&config, sample_tx) {
        Ok(opened) => opened,
        Err(e) => {
            capturing.store(false, Ordering::SeqCst);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let device_rate = stream.sample_rate;
    let device_channels = stream.channels;
    let _ = ready_tx.send(Ok((device_rate, device_channels)));

    let target_rate = config.target_sample_rate;
    let target_channels = config.target_channels;

    // Samples per emitted frame, in device format
    let frame_samples =
        (device_rate as u64 * config.buffer_duration_ms / 1000) as usize * device_channels as usize;

    let mut pending: Vec<i16> = Vec::with_capacity(frame_samples * 2);
    let mut timestamp_ms: u64 = 0;

    while capturing.load(Ordering::SeqCst) {
        match sample_rx.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(samples) => pending.extend_from_slice(&samples),
            Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }

        while pending.len() >= frame_samples {
            let chunk: Vec<i16> = pending.drain(..frame_samples).collect();
            let frame = convert_frame(
                AudioFrame {
                    samples: chunk,
                    sample_rate: device_rate,
                    channels: device_channels,
                    timestamp_ms,
                },
                target_rate,
                target_channels,
            );
            timestamp_ms += config.buffer_duration_ms;

            if frame_tx.blocking_send(frame).is_err() {
                warn!("Frame receiver dropped, stopping microphone capture");
                capturing.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    // Flush whatever the callback delivered before the stream winds down
    if !pending.is_empty() {
        let frame = convert_frame(
            AudioFrame {
                samples: std::mem::take(&mut pending),
                sample_rate: device_rate,
                channels: device_channels,
                timestamp_ms,
            },
            target_rate,
            target_channels,
        );
        let _ = frame_tx.blocking_send(frame);
    }

    drop(stream);
}

struct OpenedStream {
    _stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}

fn open_input_stream(
    config: &AudioBackendConfig,
    sample_tx: std_mpsc::Sender<Vec<i16>>,
) -> Result<OpenedStream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("no input device available")?;

    info!("Audio input device: {}", device.name().unwrap_or_default());

    // Prefer the target rate if the device supports it, otherwise take the
    // device default and downsample later.
    let mut selected = None;
    for range in device
        .supported_input_configs()
        .context("failed to query input configs")?
    {
        if range.min_sample_rate().0 <= config.target_sample_rate
            && range.max_sample_rate().0 >= config.target_sample_rate
        {
            selected = Some(range.with_sample_rate(cpal::SampleRate(config.target_sample_rate)));
            break;
        }
    }
    let stream_config = match selected {
        Some(c) => c,
        None => device
            .default_input_config()
            .context("failed to get default input config")?,
    };

    let sample_rate = stream_config.sample_rate().0;
    let channels = stream_config.channels();
    let sample_format = stream_config.sample_format();

    info!(
        "Audio config selected: {}Hz, {} channel(s), {:?}",
        sample_rate, channels, sample_format
    );

    let err_fn = |err| error!("Audio stream error: {}", err);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let tx = sample_tx.clone();
            device.build_input_stream(
                &stream_config.into(),
                move |data: &[f32], _: &_| {
                    let samples: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    let _ = tx.send(samples);
                },
                err_fn,
                None,
            )?
        }
        cpal::SampleFormat::I16 => {
            let tx = sample_tx.clone();
            device.build_input_stream(
                &stream_config.into(),
                move |data: &[i16], _: &_| {
                    let _ = tx.send(data.to_vec());
                },
                err_fn,
                None,
            )?
        }
        other => anyhow::bail!("unsupported sample format: {:?}", other),
    };

    stream.play().context("failed to start input stream")?;

    Ok(OpenedStream {
        _stream: stream,
        sample_rate,
        channels,
    })
}

/// Convert a device-format frame to the target rate and channel count
fn convert_frame(frame: AudioFrame, target_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    if processed.channels != target_channels && target_channels == 1 {
        processed = stereo_to_mono(processed);
    }

    if processed.sample_rate != target_rate {
        processed = downsample_frame(processed, target_rate);
    }

    processed
}

/// Downsample by decimation (take every Nth sample)
fn downsample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate {
        return frame;
    }

    let ratio = frame.sample_rate / target_rate;
    if ratio <= 1 {
        return frame; // can't upsample
    }

    let downsampled: Vec<i16> = frame
        .samples
        .iter()
        .step_by(ratio as usize)
        .copied()
        .collect();

    AudioFrame {
        samples: downsampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert stereo to mono by summing channels
fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels != 2 {
        return frame; // only stereo -> mono supported
    }

    let mut mono_samples = Vec::with_capacity(frame.samples.len() / 2);

    for chunk in frame.samples.chunks_exact(2) {
        let sum = chunk[0] as i32 + chunk[1] as i32;
        mono_samples.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_halves_48k_to_16k() {
        let frame = AudioFrame {
            samples: (0..4800).map(|i| i as i16).collect(),
            sample_rate: 48000,
            channels: 1,
            timestamp_ms: 0,
        };

        let out = downsample_frame(frame, 16000);
        assert_eq!(out.sample_rate, 16000);
        assert_eq!(out.samples.len(), 1600);
        assert_eq!(out.samples[1], 3); // every 3rd sample
    }

    #[test]
    fn stereo_to_mono_sums_channels() {
        let frame = AudioFrame {
            samples: vec![100, 200, -50, 50],
            sample_rate: 16000,
            channels: 2,
            timestamp_ms: 0,
        };

        let out = stereo_to_mono(frame);
        assert_eq!(out.channels, 1);
        assert_eq!(out.samples, vec![300, 0]);
    }
}
