use encore_ports::audio::AudioRenderCallback;
use encore_ports::types::SampleTime;
use rtrb::Consumer;
use rustysynth::Synthesizer;

const CHANNEL: i32 = 0;
const PROGRAM_CHANGE: i32 = 0xC0;
const LIMIT: f32 = 0.98;

/// Instrument calls forwarded to the audio thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrumentCommand {
    Program(u8),
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
    AllNotesOff,
}

/// The part of a synthesizer the renderer drives.
pub trait SynthEngine: Send + 'static {
    fn apply(&mut self, command: InstrumentCommand);
    fn render_block(&mut self, left: &mut [f32], right: &mut [f32]);
}

impl SynthEngine for Synthesizer {
    fn apply(&mut self, command: InstrumentCommand) {
        match command {
            InstrumentCommand::Program(program) => {
                self.process_midi_message(CHANNEL, PROGRAM_CHANGE, program as i32, 0);
            }
            InstrumentCommand::NoteOn { key, velocity } => {
                self.note_on(CHANNEL, key as i32, velocity as i32);
            }
            InstrumentCommand::NoteOff { key } => self.note_off(CHANNEL, key as i32),
            InstrumentCommand::AllNotesOff => self.note_off_all(true),
        }
    }

    fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.render(left, right);
    }
}

/// Audio callback: drains pending commands at the start of each block, renders
/// the synthesizer, then applies master volume and a soft peak limiter.
pub struct SynthRenderer<S> {
    engine: S,
    commands: Consumer<InstrumentCommand>,
    master_volume: f32,
    limiter_gain: f32,
}

impl<S: SynthEngine> SynthRenderer<S> {
    pub fn new(engine: S, commands: Consumer<InstrumentCommand>, master_volume: f32) -> Self {
        Self {
            engine,
            commands,
            master_volume: master_volume.clamp(0.0, 1.0),
            limiter_gain: 1.0,
        }
    }

    fn limit(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let peak = out_l
            .iter()
            .chain(out_r.iter())
            .fold(0.0_f32, |peak, sample| peak.max(sample.abs()));

        let target_gain = if peak > LIMIT { LIMIT / peak } else { 1.0 };
        // Fast attack, slow release.
        let coeff = if target_gain < self.limiter_gain { 0.25 } else { 0.01 };
        self.limiter_gain =
            (self.limiter_gain + coeff * (target_gain - self.limiter_gain)).clamp(0.0, 1.0);

        if self.limiter_gain < 0.999 {
            for sample in out_l.iter_mut().chain(out_r.iter_mut()) {
                *sample *= self.limiter_gain;
            }
        }
    }
}

impl<S: SynthEngine> AudioRenderCallback for SynthRenderer<S> {
    fn render(&mut self, _sample_time_start: SampleTime, out_l: &mut [f32], out_r: &mut [f32]) {
        while let Ok(command) = self.commands.pop() {
            self.engine.apply(command);
        }

        let frames = out_l.len().min(out_r.len());
        let (out_l, out_r) = (&mut out_l[..frames], &mut out_r[..frames]);
        self.engine.render_block(out_l, out_r);

        for sample in out_l.iter_mut().chain(out_r.iter_mut()) {
            *sample *= self.master_volume;
        }
        self.limit(out_l, out_r);
    }
}
