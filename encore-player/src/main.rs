//! Console front end for piece playback.
//!
//! Reads commands from stdin, drives the playback controller and prints every
//! protocol event as one JSON line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use encore_core::{spawn_clock, Command, PlaybackController};
use encore_infra_audio_cpal::CpalAudioOutputPort;
use encore_infra_notes_http::{BackendClient, HttpCatalog, HttpNoteSource};
use encore_infra_synth_rustysynth::SoundFontLoader;
use encore_ports::catalog::CatalogPort;
use encore_ports::instrument::SampleSource;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod console;

use config::PlayerConfig;
use console::{parse_line, ConsoleCommand, HELP};

const EVENT_PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "encore-player")]
#[command(about = "Play sheet-music pieces from the music backend")]
#[command(version)]
struct Args {
    /// JSON config file; command-line values win over it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base url of the music backend
    #[arg(short, long, env = "ENCORE_BACKEND_URL")]
    backend_url: Option<String>,

    /// SoundFont path or http(s) url
    #[arg(short, long, env = "ENCORE_SOUNDFONT")]
    soundfont: Option<String>,

    /// Initial tempo in bpm
    #[arg(short, long)]
    tempo: Option<f64>,

    /// Output device id; the system default when omitted
    #[arg(long)]
    device: Option<String>,
}

impl Args {
    fn apply(self, mut config: PlayerConfig) -> PlayerConfig {
        if let Some(url) = self.backend_url {
            config.backend_url = url;
        }
        if let Some(soundfont) = self.soundfont {
            config.soundfont = Some(soundfont);
        }
        if let Some(tempo) = self.tempo {
            config.default_tempo_bpm = tempo;
        }
        if let Some(device) = self.device {
            config.audio_device = Some(device);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = PlayerConfig::load(args.config.as_deref())?;
    let config = args.apply(config);

    let soundfont = config
        .soundfont
        .as_deref()
        .context("no SoundFont configured; pass --soundfont or set ENCORE_SOUNDFONT")?;

    let backend = BackendClient::new(&config.backend_url)
        .with_context(|| format!("unusable backend url {}", config.backend_url))?;
    let notes = Arc::new(HttpNoteSource::new(backend.clone()));
    let catalog = HttpCatalog::new(backend);

    let loader = SoundFontLoader::new(SampleSource::parse(soundfont), Arc::new(CpalAudioOutputPort::new()))
        .with_device(config.audio_device())
        .with_audio_config(config.audio_config())
        .with_master_volume(config.master_volume);

    let controller = Arc::new(PlaybackController::new(
        notes,
        Arc::new(loader),
        config.session_config(),
    ));
    controller.set_tempo(config.default_tempo_bpm);

    let _clock = spawn_clock(
        controller.clone(),
        Duration::from_millis(config.tick_interval_ms),
    );
    let pump = tokio::spawn(pump_events(controller.clone()));

    info!(backend = %config.backend_url, soundfont, "encore player ready");
    eprintln!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        match command {
            ConsoleCommand::Session(command @ Command::Play { .. }) => {
                // Playing suspends on the network; run it beside the console so
                // a stop can still come through.
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Err(error) = controller.handle_command(command).await {
                        tracing::debug!(%error, "play failed");
                    }
                });
            }
            ConsoleCommand::Session(command) => {
                if let Err(error) = controller.handle_command(command).await {
                    eprintln!("{error}");
                }
            }
            ConsoleCommand::Search(query) => match catalog.search(&query).await {
                Ok(pieces) => print_json(&pieces),
                Err(error) => eprintln!("search failed: {error}"),
            },
            ConsoleCommand::List(facet) => match catalog.list(facet).await {
                Ok(values) => print_json(&values),
                Err(error) => eprintln!("listing failed: {error}"),
            },
            ConsoleCommand::ComposerInfo(name) => match catalog.composer_info(&name).await {
                Ok(info) => print_json(&info),
                Err(error) => eprintln!("composer lookup failed: {error}"),
            },
            ConsoleCommand::Status => print_json(&controller.status()),
            ConsoleCommand::Help => eprintln!("{HELP}"),
            ConsoleCommand::Quit => break,
        }
    }

    controller.stop();
    tokio::time::sleep(EVENT_PUMP_INTERVAL).await;
    pump.abort();
    info!("encore player stopped");
    Ok(())
}

async fn pump_events(controller: Arc<PlaybackController>) {
    let mut interval = tokio::time::interval(EVENT_PUMP_INTERVAL);
    loop {
        interval.tick().await;
        for event in controller.drain_events() {
            print_json(&event);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(error) => tracing::warn!(%error, "could not encode output"),
    }
}
