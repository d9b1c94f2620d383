use anyhow::{Context, Result};
use encore_core::SessionConfig;
use encore_domain_timeline::DEFAULT_BPM;
use encore_ports::types::{AudioConfig, DeviceId};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_tempo_bpm() -> f64 {
    DEFAULT_BPM
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_tempo_ramp_seconds() -> f64 {
    0.1
}

fn default_beats_per_bar() -> u32 {
    4
}

fn default_sample_rate_hz() -> u32 {
    48_000
}

fn default_master_volume() -> f32 {
    0.8
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Path or http(s) url of the SoundFont.
    pub soundfont: Option<String>,
    pub audio_device: Option<String>,
    #[serde(default = "default_tempo_bpm")]
    pub default_tempo_bpm: f64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_tempo_ramp_seconds")]
    pub tempo_ramp_seconds: f64,
    #[serde(default = "default_beats_per_bar")]
    pub beats_per_bar: u32,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    pub audio_buffer_frames: Option<u32>,
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            soundfont: None,
            audio_device: None,
            default_tempo_bpm: default_tempo_bpm(),
            tick_interval_ms: default_tick_interval_ms(),
            tempo_ramp_seconds: default_tempo_ramp_seconds(),
            beats_per_bar: default_beats_per_bar(),
            sample_rate_hz: default_sample_rate_hz(),
            audio_buffer_frames: None,
            master_volume: default_master_volume(),
        }
    }
}

impl PlayerConfig {
    /// Defaults, overlaid with the JSON file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tempo_ramp_seconds: self.tempo_ramp_seconds.max(0.0),
            beats_per_bar: self.beats_per_bar.max(1),
            ..SessionConfig::default()
        }
    }

    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            sample_rate_hz: self.sample_rate_hz,
            buffer_size_frames: self.audio_buffer_frames,
            ..AudioConfig::default()
        }
    }

    pub fn audio_device(&self) -> Option<DeviceId> {
        self.audio_device
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| DeviceId(id.to_string()))
    }
}
