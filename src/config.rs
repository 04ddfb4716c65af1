//! File-backed configuration for the CLI.

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub audio: AudioConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// HTTP base, e.g. `http://localhost:8001`
    pub base_url: String,
    /// WebSocket base, e.g. `ws://localhost:8001`
    pub ws_url: String,
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub segment_duration_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct UploadConfig {
    pub max_in_flight: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
