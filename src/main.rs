// Record a live lecture session against a configured backend.
//
// Creates the lecture over HTTP, opens its event stream, records the
// microphone in 20-second segments, and prints notes as they arrive.
//
// Usage: cargo run -- --subject-id <id> --title "Lecture 3" [--duration 60]
//        add --input-file <wav> to replay a recording instead of capturing

use anyhow::Result;
use clap::Parser;
use lectio::api::ApiClient;
use lectio::audio::AudioSource;
use lectio::session::{LectureSession, SessionConfig};
use lectio::Config;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lectio")]
#[command(about = "Record a live lecture and collect its notes")]
struct Args {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/lectio")]
    config: String,

    /// Subject the lecture belongs to
    #[arg(short, long)]
    subject_id: String,

    /// Lecture title
    #[arg(short, long, default_value = "Live Lecture")]
    title: String,

    /// Recording duration in seconds; omit to record until Ctrl-C
    #[arg(short, long)]
    duration: Option<u64>,

    /// Directory for the exported notes file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Replay a WAV file instead of recording the microphone
    #[arg(short, long)]
    input_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("lectio v0.1.0");
    info!("Backend: {}", cfg.backend.base_url);

    let api = ApiClient::new(
        &cfg.backend.base_url,
        &cfg.backend.auth_token,
        Duration::from_secs(30),
    )?;

    let lecture_id = api.create_lecture(&args.title, &args.subject_id).await?;
    info!("Lecture created: {}", lecture_id);

    let session_config = SessionConfig {
        lecture_id,
        title: args.title.clone(),
        subject: args.subject_id.clone(),
        segment_duration: Duration::from_secs(cfg.audio.segment_duration_secs),
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        api_base_url: cfg.backend.base_url.clone(),
        ws_base_url: cfg.backend.ws_url.clone(),
        auth_token: cfg.backend.auth_token.clone(),
        audio_source: match &args.input_file {
            Some(path) => AudioSource::File(path.display().to_string()),
            None => AudioSource::Microphone,
        },
        uploader: lectio::UploaderConfig {
            max_in_flight: cfg.upload.max_in_flight,
            max_attempts: cfg.upload.max_attempts,
            backoff_base_ms: cfg.upload.backoff_base_ms,
        },
        ..SessionConfig::default()
    };

    let session = LectureSession::connect(session_config).await?;
    session.start().await?;
    info!("Recording... press Ctrl-C to stop");

    match args.duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await?;
        }
    }

    let stats = session.stop().await?;
    info!(
        "Stopped: {} segments uploaded, {} failed",
        stats.uploaded, stats.failed
    );

    // Final synthesis takes a while; poll the snapshot for the notes
    info!("Waiting for final notes...");
    let mut final_ready = false;
    for _ in 0..60 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        if session.snapshot().await.final_notes.is_some() {
            final_ready = true;
            break;
        }
    }

    if final_ready {
        let path = session.download(&args.output_dir).await?;
        info!("Notes written to {}", path.display());

        if let Err(e) = session.save().await {
            warn!("Save not confirmed by backend: {}", e);
        }
    } else {
        warn!("No final notes arrived; nothing to export");
    }

    let snapshot = session.snapshot().await;
    info!(
        "Session summary: {}s recorded, {} transcriptions, {} structured updates",
        snapshot.elapsed_secs,
        snapshot.transcriptions.len(),
        snapshot.structured_notes.len()
    );

    session.close().await;
    Ok(())
}
