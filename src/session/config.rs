use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::AudioSource;
use crate::upload::UploaderConfig;

/// Configuration for a live lecture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend-assigned lecture identifier
    pub lecture_id: String,

    /// Lecture title (also names the exported notes file)
    pub title: String,

    /// Subject the lecture belongs to
    pub subject: String,

    /// Duration of each uploaded audio segment
    /// Default: 20 seconds
    pub segment_duration: Duration,

    /// Sample rate for captured audio (backend STT expects 16kHz)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Where captured audio comes from; a WAV path replays a file
    /// instead of opening the microphone
    #[serde(default = "default_source")]
    pub audio_source: AudioSource,

    /// HTTP API base URL
    pub api_base_url: String,

    /// WebSocket base URL
    pub ws_base_url: String,

    /// Bearer token for the backend
    pub auth_token: String,

    /// Bound on the WebSocket connection attempt
    pub connect_timeout: Duration,

    /// Segment upload pool tuning
    #[serde(default)]
    pub uploader: UploaderConfig,
}

fn default_source() -> AudioSource {
    AudioSource::Microphone
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lecture_id: String::new(),
            title: "Live Lecture".to_string(),
            subject: String::new(),
            segment_duration: Duration::from_secs(20),
            sample_rate: 16000, // backend STT expects 16kHz
            channels: 1,        // mono
            audio_source: AudioSource::Microphone,
            api_base_url: "http://localhost:8001".to_string(),
            ws_base_url: "ws://localhost:8001".to_string(),
            auth_token: String::new(),
            connect_timeout: Duration::from_secs(10),
            uploader: UploaderConfig::default(),
        }
    }
}
