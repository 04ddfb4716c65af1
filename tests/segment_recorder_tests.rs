// Integration tests for audio segmenting
//
// These tests verify that audio frames are folded into bounded-duration,
// contiguous, non-overlapping WAV segments, and that the partial tail is
// flushed as a final shorter segment when capture ends.

use anyhow::Result;
use lectio::audio::{AudioFrame, AudioSegment, SegmentConfig, SegmentRecorder};
use std::io::Cursor;
use tokio::sync::mpsc;

const SAMPLE_RATE: u32 = 16000;
const SAMPLES_PER_FRAME: usize = 1600; // 100ms at 16kHz mono

fn frame(index: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![(index % 100) as i16; SAMPLES_PER_FRAME],
        sample_rate: SAMPLE_RATE,
        channels: 1,
        timestamp_ms: index * 100,
    }
}

async fn run_recorder(
    segment_duration_secs: u64,
    num_frames: u64,
) -> Result<Vec<AudioSegment>> {
    let config = SegmentConfig {
        segment_duration_secs,
        sample_rate: SAMPLE_RATE,
        channels: 1,
    };

    let (frame_tx, frame_rx) = mpsc::channel(100);
    let (segment_tx, mut segment_rx) = mpsc::channel(100);

    let recording_handle = tokio::spawn(async move {
        let mut recorder = SegmentRecorder::new(config);
        recorder.record(frame_rx, segment_tx).await
    });

    for i in 0..num_frames {
        frame_tx.send(frame(i)).await?;
    }
    drop(frame_tx); // end of capture

    let mut segments = Vec::new();
    while let Some(segment) = segment_rx.recv().await {
        segments.push(segment);
    }

    let summaries = recording_handle.await??;
    assert_eq!(summaries.len(), segments.len());

    Ok(segments)
}

#[tokio::test]
async fn short_capture_flushes_single_partial_segment() -> Result<()> {
    // 5 seconds of audio against 20-second segments
    let segments = run_recorder(20, 50).await?;

    assert_eq!(segments.len(), 1, "should flush exactly 1 partial segment");

    let segment = &segments[0];
    assert_eq!(segment.index, 0);
    assert_eq!(segment.start_ms, 0);
    assert_eq!(segment.end_ms, 5000);
    assert_eq!(segment.sample_count, SAMPLES_PER_FRAME * 50);
    assert!(!segment.wav_bytes.is_empty());

    Ok(())
}

#[tokio::test]
async fn forty_five_seconds_yields_two_full_segments_and_a_short_tail() -> Result<()> {
    // 45 seconds of continuous recording at 20s per segment:
    // two full segments, then stop flushes the 5s tail as a third
    let segments = run_recorder(20, 450).await?;

    assert_eq!(segments.len(), 3);

    assert_eq!(segments[0].start_ms, 0);
    assert_eq!(segments[0].end_ms, 20_000);
    assert_eq!(segments[1].start_ms, 20_000);
    assert_eq!(segments[1].end_ms, 40_000);
    assert_eq!(segments[2].start_ms, 40_000);
    assert_eq!(segments[2].end_ms, 45_000);

    // Full segments hold exactly 20s of samples, the tail holds 5s
    assert_eq!(segments[0].sample_count, SAMPLES_PER_FRAME * 200);
    assert_eq!(segments[1].sample_count, SAMPLES_PER_FRAME * 200);
    assert_eq!(segments[2].sample_count, SAMPLES_PER_FRAME * 50);

    Ok(())
}

#[tokio::test]
async fn segments_are_contiguous_and_non_overlapping() -> Result<()> {
    let segments = run_recorder(2, 70).await?; // 7s at 2s segments

    assert_eq!(segments.len(), 4);

    for pair in segments.windows(2) {
        assert_eq!(
            pair[0].end_ms, pair[1].start_ms,
            "segment boundaries must be contiguous"
        );
    }

    for (i, segment) in segments.iter().enumerate() {
        assert_eq!(segment.index, i);
    }

    Ok(())
}

#[tokio::test]
async fn emitted_segments_are_playable_wav() -> Result<()> {
    let segments = run_recorder(20, 10).await?; // 1 second

    let segment = &segments[0];
    let reader = hound::WavReader::new(Cursor::new(segment.wav_bytes.clone()))?;

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(samples.len(), segment.sample_count);

    Ok(())
}

#[tokio::test]
async fn empty_capture_emits_nothing() -> Result<()> {
    let segments = run_recorder(20, 0).await?;
    assert!(segments.is_empty());
    Ok(())
}
