use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig,
    SupportedStreamConfigRange,
};
use encore_ports::audio::{AudioError, AudioOutputPort, AudioRenderCallback, AudioStreamHandle};
use encore_ports::types::{AudioConfig, AudioOutputDevice, DeviceId};
use std::sync::mpsc;
use std::thread;

const DEFAULT_SCRATCH_FRAMES: usize = 8192;

/// Audio output through the platform's default cpal host.
///
/// cpal streams are not `Send` on every platform, so each opened stream lives
/// on its own thread until its handle is closed.
pub struct CpalAudioOutputPort {
    host: cpal::Host,
}

struct SelectedStreamConfig {
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl CpalAudioOutputPort {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn devices(host: &cpal::Host) -> Result<Vec<(DeviceId, cpal::Device)>, AudioError> {
        let host_id = format!("{:?}", host.id());
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device_name(&device);
                let id = DeviceId(format!("cpal:{}:{}:{}", host_id, index, name));
                (id, device)
            })
            .collect())
    }

    fn find_device(host: &cpal::Host, device_id: Option<&DeviceId>) -> Result<cpal::Device, AudioError> {
        match device_id {
            None => host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceUnavailable("no default output device".to_string())),
            Some(wanted) => Self::devices(host)?
                .into_iter()
                .find(|(id, _)| id == wanted)
                .map(|(_, device)| device)
                .ok_or_else(|| AudioError::DeviceNotFound(wanted.to_string())),
        }
    }

    fn select_stream_config(
        device: &cpal::Device,
        desired: AudioConfig,
    ) -> Result<SelectedStreamConfig, AudioError> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let chosen = select_supported_config(&mut supported, desired)?;
        let sample_format = chosen.sample_format();
        let mut config = chosen.config();
        config.buffer_size = match desired.buffer_size_frames {
            Some(frames) => BufferSize::Fixed(frames),
            None => BufferSize::Default,
        };

        Ok(SelectedStreamConfig {
            config,
            sample_format,
        })
    }
}

impl Default for CpalAudioOutputPort {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CpalAudioStreamHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AudioStreamHandle for CpalAudioStreamHandle {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl AudioOutputPort for CpalAudioOutputPort {
    fn list_outputs(&self) -> Result<Vec<AudioOutputDevice>, AudioError> {
        let mut results = Vec::new();
        for (id, device) in Self::devices(&self.host)? {
            let Ok(default_config) = device.default_output_config() else {
                continue;
            };
            results.push(AudioOutputDevice {
                id,
                name: device_name(&device),
                default_config: AudioConfig {
                    sample_rate_hz: default_config.sample_rate().0,
                    channels: default_config.channels(),
                    buffer_size_frames: None,
                },
            });
        }
        Ok(results)
    }

    fn open_output(
        &self,
        device_id: Option<&DeviceId>,
        config: AudioConfig,
        cb: Box<dyn AudioRenderCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let device_id = device_id.cloned();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join_handle = thread::spawn(move || {
            let host = cpal::default_host();
            let opened = Self::find_device(&host, device_id.as_ref()).and_then(|device| {
                let selected = Self::select_stream_config(&device, config)?;
                let stream = build_stream(&device, &selected, cb)?;
                stream
                    .play()
                    .map_err(|e| AudioError::Backend(e.to_string()))?;
                tracing::info!(
                    device = %device_name(&device),
                    sample_rate_hz = selected.config.sample_rate.0,
                    channels = selected.config.channels,
                    format = ?selected.sample_format,
                    "audio output opened"
                );
                Ok(stream)
            });

            match opened {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(stream);
                    tracing::debug!("audio output closed");
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            }
        });

        ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))??;

        Ok(Box::new(CpalAudioStreamHandle {
            stop_tx,
            join_handle: Some(join_handle),
        }))
    }
}

fn device_name(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "Unknown Output".to_string())
}

fn build_stream(
    device: &cpal::Device,
    selected: &SelectedStreamConfig,
    cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, AudioError> {
    match selected.sample_format {
        SampleFormat::F32 => build_typed_stream::<f32>(device, &selected.config, cb),
        SampleFormat::I16 => build_typed_stream::<i16>(device, &selected.config, cb),
        SampleFormat::U16 => build_typed_stream::<u16>(device, &selected.config, cb),
        other => Err(AudioError::UnsupportedConfig(format!(
            "sample format {other:?}"
        ))),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut cb: Box<dyn AudioRenderCallback>,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let scratch_frames = match config.buffer_size {
        BufferSize::Fixed(frames) => frames as usize,
        BufferSize::Default => DEFAULT_SCRATCH_FRAMES,
    };
    let mut left = vec![0.0_f32; scratch_frames];
    let mut right = vec![0.0_f32; scratch_frames];
    let mut sample_time: u64 = 0;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                let frames = if channels == 0 { 0 } else { data.len() / channels };
                if frames > left.len() {
                    left.resize(frames, 0.0);
                    right.resize(frames, 0.0);
                }
                cb.render(sample_time, &mut left[..frames], &mut right[..frames]);
                write_interleaved(data, channels, &left[..frames], &right[..frames]);
                sample_time = sample_time.saturating_add(frames as u64);
            },
            |err| tracing::error!(%err, "audio stream error"),
            None,
        )
        .map_err(|e| AudioError::Backend(e.to_string()))
}

fn select_supported_config(
    supported: &mut dyn Iterator<Item = SupportedStreamConfigRange>,
    desired: AudioConfig,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    supported
        .filter(|range| range.channels() == desired.channels)
        .filter(|range| {
            (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&desired.sample_rate_hz)
        })
        .max_by_key(|range| format_preference(range.sample_format()))
        .filter(|range| format_preference(range.sample_format()) > 0)
        .map(|range| range.with_sample_rate(SampleRate(desired.sample_rate_hz)))
        .ok_or_else(|| {
            AudioError::UnsupportedConfig(format!(
                "no {} channel output at {} Hz",
                desired.channels, desired.sample_rate_hz
            ))
        })
}

fn format_preference(format: SampleFormat) -> u8 {
    match format {
        SampleFormat::F32 => 3,
        SampleFormat::I16 => 2,
        SampleFormat::U16 => 1,
        _ => 0,
    }
}

/// Write the stereo pair into an interleaved buffer: mono gets the average,
/// extra channels get silence.
fn write_interleaved<T>(data: &mut [T], channels: usize, left: &[f32], right: &[f32])
where
    T: SizedSample + FromSample<f32>,
{
    if channels == 0 {
        return;
    }
    for (frame, samples) in data.chunks_exact_mut(channels).enumerate() {
        let l = left.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        let r = right.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
        if channels == 1 {
            samples[0] = T::from_sample((l + r) * 0.5);
            continue;
        }
        samples[0] = T::from_sample(l);
        samples[1] = T::from_sample(r);
        for sample in &mut samples[2..] {
            *sample = T::from_sample(0.0);
        }
    }
}
