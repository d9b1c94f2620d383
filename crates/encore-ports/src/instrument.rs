use crate::types::{Pitch, Velocity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("sample assets unreachable: {0}")]
    Unreachable(String),
    #[error("invalid sample assets: {0}")]
    InvalidAssets(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
}

/// Where the sampled instrument's assets live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SampleSource {
    Path(PathBuf),
    Url(String),
}

impl SampleSource {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            SampleSource::Url(trimmed.to_string())
        } else {
            SampleSource::Path(PathBuf::from(trimmed))
        }
    }
}

/// A loaded sampled instrument.
///
/// Calls come from the session controller thread; implementations forward them
/// to the audio thread without blocking it.
pub trait InstrumentPort: Send + Sync {
    fn set_program(&self, gm_program: u8);
    fn note_on(&self, pitch: Pitch, velocity: Velocity);
    fn note_off(&self, pitch: Pitch);
    /// Silence everything immediately, including release tails.
    fn all_notes_off(&self);
}

#[async_trait]
pub trait SampleLoaderPort: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn InstrumentPort>, LoadError>;
}
