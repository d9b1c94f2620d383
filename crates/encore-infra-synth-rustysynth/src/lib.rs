pub mod renderer;

pub use renderer::*;

use async_trait::async_trait;
use encore_ports::audio::{AudioOutputPort, AudioStreamHandle};
use encore_ports::instrument::{InstrumentPort, LoadError, SampleLoaderPort, SampleSource};
use encore_ports::types::{AudioConfig, DeviceId, Pitch, Velocity};
use parking_lot::Mutex;
use rtrb::{Producer, RingBuffer};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};
use std::io::Cursor;
use std::sync::Arc;

const COMMAND_QUEUE_CAPACITY: usize = 1024;
const SYNTH_MASTER_VOLUME: f32 = 0.25;

/// A SoundFont synthesizer playing through an open audio stream. Calls are
/// queued to the audio thread and never block on it.
pub struct SoundFontInstrument {
    commands: Mutex<Producer<InstrumentCommand>>,
    stream: Mutex<Option<Box<dyn AudioStreamHandle>>>,
}

impl SoundFontInstrument {
    fn new(commands: Producer<InstrumentCommand>, stream: Box<dyn AudioStreamHandle>) -> Self {
        Self {
            commands: Mutex::new(commands),
            stream: Mutex::new(Some(stream)),
        }
    }

    fn send(&self, command: InstrumentCommand) {
        if self.commands.lock().push(command).is_err() {
            tracing::warn!(?command, "instrument command queue full; command dropped");
        }
    }
}

impl Drop for SoundFontInstrument {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.get_mut().take() {
            stream.close();
        }
    }
}

impl InstrumentPort for SoundFontInstrument {
    fn set_program(&self, gm_program: u8) {
        self.send(InstrumentCommand::Program(gm_program.min(127)));
    }

    fn note_on(&self, pitch: Pitch, velocity: Velocity) {
        self.send(InstrumentCommand::NoteOn {
            key: pitch.key(),
            velocity: velocity.to_midi(),
        });
    }

    fn note_off(&self, pitch: Pitch) {
        self.send(InstrumentCommand::NoteOff { key: pitch.key() });
    }

    fn all_notes_off(&self) {
        self.send(InstrumentCommand::AllNotesOff);
    }
}

/// Loads a SoundFont from disk or over HTTP and opens an audio output for it.
pub struct SoundFontLoader {
    source: SampleSource,
    audio: Arc<dyn AudioOutputPort>,
    device: Option<DeviceId>,
    audio_config: AudioConfig,
    master_volume: f32,
    http: reqwest::Client,
}

impl SoundFontLoader {
    pub fn new(source: SampleSource, audio: Arc<dyn AudioOutputPort>) -> Self {
        Self {
            source,
            audio,
            device: None,
            audio_config: AudioConfig::default(),
            master_volume: 0.8,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_device(mut self, device: Option<DeviceId>) -> Self {
        self.device = device;
        self
    }

    pub fn with_audio_config(mut self, audio_config: AudioConfig) -> Self {
        self.audio_config = audio_config;
        self
    }

    pub fn with_master_volume(mut self, master_volume: f32) -> Self {
        self.master_volume = master_volume;
        self
    }

    async fn fetch_bytes(&self) -> Result<Vec<u8>, LoadError> {
        match &self.source {
            SampleSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| LoadError::Unreachable(format!("{}: {}", path.display(), e))),
            SampleSource::Url(url) => {
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| LoadError::Unreachable(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(LoadError::Unreachable(format!("{url} returned {status}")));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| LoadError::Unreachable(e.to_string()))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

#[async_trait]
impl SampleLoaderPort for SoundFontLoader {
    async fn load(&self) -> Result<Arc<dyn InstrumentPort>, LoadError> {
        let bytes = self.fetch_bytes().await?;
        tracing::debug!(bytes = bytes.len(), source = ?self.source, "sound font fetched");

        let sound_font = tokio::task::spawn_blocking(move || parse_sound_font(&bytes))
            .await
            .map_err(|e| LoadError::InvalidAssets(e.to_string()))??;
        let sound_font = Arc::new(sound_font);
        let synth = build_synthesizer(&sound_font, self.audio_config.sample_rate_hz)?;

        let (tx, rx) = RingBuffer::new(COMMAND_QUEUE_CAPACITY);
        let renderer = SynthRenderer::new(synth, rx, self.master_volume);
        let stream = self
            .audio
            .open_output(self.device.as_ref(), self.audio_config, Box::new(renderer))
            .map_err(|e| LoadError::Output(e.to_string()))?;

        tracing::info!(
            bank = %sound_font.get_info().get_bank_name().trim(),
            presets = sound_font.get_presets().len(),
            "sound font instrument ready"
        );
        Ok(Arc::new(SoundFontInstrument::new(tx, stream)))
    }
}

pub fn parse_sound_font(bytes: &[u8]) -> Result<SoundFont, LoadError> {
    SoundFont::new(&mut Cursor::new(bytes)).map_err(|e| LoadError::InvalidAssets(e.to_string()))
}

pub fn build_synthesizer(sound_font: &Arc<SoundFont>, sample_rate_hz: u32) -> Result<Synthesizer, LoadError> {
    let mut settings = SynthesizerSettings::new(sample_rate_hz as i32);
    settings.enable_reverb_and_chorus = false;
    let mut synth =
        Synthesizer::new(sound_font, &settings).map_err(|e| LoadError::InvalidAssets(e.to_string()))?;
    synth.set_master_volume(SYNTH_MASTER_VOLUME);
    Ok(synth)
}
