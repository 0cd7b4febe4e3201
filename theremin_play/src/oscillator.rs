//! The oscillator sink: one continuous tone, two scalars, start/stop.
//!
//! [`OscillatorSink`] owns the instrument state and forwards every change to
//! a [`ToneOutput`] backend:
//!
//! * [`CpalTone`] renders a sine on the default audio device; its callback
//!   reads the shared [`ToneParams`] directly, so updates need no message;
//! * [`MidiTone`] plays the nearest MIDI note, bent to the exact frequency,
//!   with channel volume for amplitude;
//! * [`NullTone`] is silent, for tests and machines without audio.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, Stream, StreamConfig};
use theremin_map::{FrequencyRange, InstrumentState, SineVoice, ToneParams};

use crate::config::ToneOutputKind;
use crate::error::ToneError;

// ════════════════════════════════════════════════════════════════════════════
// ToneOutput: abstraction over cpal / midir / null
// ════════════════════════════════════════════════════════════════════════════

pub trait ToneOutput {
    fn name(&self) -> &str;

    /// The instrument state changed.
    fn update(&mut self, state: &InstrumentState);
}

// ── null backend ──────────────────────────────────────────────────────────

pub struct NullTone;

impl ToneOutput for NullTone {
    fn name(&self) -> &str { "silent" }
    fn update(&mut self, _state: &InstrumentState) {}
}

// ── cpal backend ──────────────────────────────────────────────────────────

/// Sine output on the default audio device.
pub struct CpalTone {
    _stream:     Stream,
    sample_rate: u32,
    channels:    u16,
}

impl CpalTone {
    pub fn open(params: Arc<ToneParams>) -> Result<Self, ToneError> {
        let host   = cpal::default_host();
        let device = host.default_output_device().ok_or(ToneError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| ToneError::Config(e.to_string()))?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let stream = match sample_format {
            cpal::SampleFormat::I16 => Self::stream_make::<i16>(&config, &device, params)?,
            cpal::SampleFormat::U16 => Self::stream_make::<u16>(&config, &device, params)?,
            cpal::SampleFormat::I32 => Self::stream_make::<i32>(&config, &device, params)?,
            cpal::SampleFormat::F32 => Self::stream_make::<f32>(&config, &device, params)?,
            cpal::SampleFormat::F64 => Self::stream_make::<f64>(&config, &device, params)?,
            other => return Err(ToneError::UnsupportedFormat(format!("{:?}", other))),
        };
        stream.play().map_err(|e| ToneError::Stream(e.to_string()))?;

        if let Ok(name) = device.name() {
            log::info!(
                "[tone] audio on {} ({} Hz, {} ch)",
                name, config.sample_rate.0, config.channels
            );
        }
        Ok(CpalTone { _stream: stream, sample_rate: config.sample_rate.0, channels: config.channels })
    }

    pub fn sample_rate(&self) -> u32 { self.sample_rate }
    pub fn channels(&self)    -> u16 { self.channels }

    /// Build a stream of sample type `T` whose callback renders `params`.
    fn stream_make<T>(
        config: &StreamConfig,
        device: &cpal::Device,
        params: Arc<ToneParams>,
    ) -> Result<Stream, ToneError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut voice   = SineVoice::new(config.sample_rate.0);
        let mut scratch = Vec::<f32>::new();

        device
            .build_output_stream(
                config,
                move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(output.len(), 0.0);
                    voice.render(&params, &mut scratch, channels);
                    for (out, &s) in output.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample(s);
                    }
                },
                |err| log::error!("[tone] output stream error: {}", err),
                None,
            )
            .map_err(|e| ToneError::Stream(e.to_string()))
    }
}

impl ToneOutput for CpalTone {
    fn name(&self) -> &str { "audio" }

    // The callback reads the shared parameters itself.
    fn update(&mut self, _state: &InstrumentState) {}
}

// ── midir backend ─────────────────────────────────────────────────────────

/// Anything that accepts raw MIDI bytes.
pub trait MidiPort {
    fn send(&mut self, message: &[u8]);
}

struct MidirPort {
    conn: midir::MidiOutputConnection,
}

impl MidiPort for MidirPort {
    fn send(&mut self, message: &[u8]) {
        if let Err(e) = self.conn.send(message) {
            log::debug!("[tone] MIDI send failed: {}", e);
        }
    }
}

/// Pitch-bend range assumed on the receiving synth, semitones each way.
pub const BEND_RANGE: f64 = 2.0;

/// Nearest MIDI note to `hz` and the 14-bit pitch bend that reaches it
/// exactly (8192 = no bend).
pub fn note_and_bend(hz: f64) -> (u8, u16) {
    let semis = 69.0 + 12.0 * (hz.max(1.0) / 440.0).log2();
    let note  = semis.round().clamp(0.0, 127.0);
    let bend  = ((semis - note) / BEND_RANGE).clamp(-1.0, 1.0);
    let value = (8192.0 + bend * 8191.0).round() as u16;
    (note as u8, value.min(16383))
}

/// One held note that follows the instrument.
pub struct MidiTone<P: MidiPort = Box<dyn MidiPort>> {
    port:     P,
    channel:  u8,
    sounding: Option<u8>,
}

impl MidiTone<Box<dyn MidiPort>> {
    /// Open the first MIDI output, preferring a software synth.
    pub fn open(channel: u8) -> Result<Self, ToneError> {
        let midi_out = midir::MidiOutput::new("theremin")
            .map_err(|e| ToneError::Midi(e.to_string()))?;

        let ports = midi_out.ports();
        if ports.is_empty() {
            return Err(ToneError::NoMidiPort);
        }
        let port_idx = ports
            .iter()
            .position(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| {
                        let n = n.to_lowercase();
                        n.contains("fluid") || n.contains("timidity") || n.contains("synth")
                    })
                    .unwrap_or(false)
            })
            .unwrap_or(0);

        let port = &ports[port_idx];
        let name = midi_out.port_name(port).unwrap_or_else(|_| "unknown".to_string());
        let conn = midi_out
            .connect(port, "theremin-tone")
            .map_err(|e| ToneError::Midi(e.to_string()))?;
        log::info!("[tone] MIDI on {}", name);

        let port: Box<dyn MidiPort> = Box::new(MidirPort { conn });
        Ok(MidiTone::with_port(port, channel))
    }
}

impl MidiPort for Box<dyn MidiPort> {
    fn send(&mut self, message: &[u8]) { (**self).send(message) }
}

impl<P: MidiPort> MidiTone<P> {
    pub fn with_port(mut port: P, channel: u8) -> Self {
        let channel = channel & 0x0F;
        // Pitch-bend sensitivity (RPN 0) = BEND_RANGE semitones.
        port.send(&[0xB0 | channel, 101, 0]);
        port.send(&[0xB0 | channel, 100, 0]);
        port.send(&[0xB0 | channel, 6, BEND_RANGE as u8]);
        MidiTone { port, channel, sounding: None }
    }

    pub fn port(&self) -> &P { &self.port }

    pub fn sounding(&self) -> Option<u8> { self.sounding }

    fn release(&mut self) {
        if let Some(note) = self.sounding.take() {
            self.port.send(&[0x80 | self.channel, note, 0]);
        }
    }
}

impl<P: MidiPort> ToneOutput for MidiTone<P> {
    fn name(&self) -> &str { "midi" }

    fn update(&mut self, state: &InstrumentState) {
        let ch = self.channel;
        let volume = (state.amplitude.clamp(0.0, 1.0) * 127.0).round() as u8;
        self.port.send(&[0xB0 | ch, 7, volume]);

        if !state.playing {
            self.release();
            return;
        }
        let (note, bend) = note_and_bend(state.frequency);
        self.port.send(&[0xE0 | ch, (bend & 0x7F) as u8, (bend >> 7) as u8]);
        if self.sounding != Some(note) {
            self.release();
            self.port.send(&[0x90 | ch, note, 100]);
            self.sounding = Some(note);
        }
    }
}

impl<P: MidiPort> Drop for MidiTone<P> {
    fn drop(&mut self) {
        self.release();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// open_tone_output: pick a backend, falling back to silence
// ════════════════════════════════════════════════════════════════════════════

pub fn open_tone_output(kind: ToneOutputKind, params: &Arc<ToneParams>) -> Box<dyn ToneOutput> {
    let opened: Result<Box<dyn ToneOutput>, ToneError> = match kind {
        ToneOutputKind::Audio => CpalTone::open(Arc::clone(params)).map(|t| Box::new(t) as Box<dyn ToneOutput>),
        ToneOutputKind::Midi  => MidiTone::open(0).map(|t| Box::new(t) as Box<dyn ToneOutput>),
        ToneOutputKind::Null  => Ok(Box::new(NullTone)),
    };
    opened.unwrap_or_else(|e| {
        log::warn!("[tone] {}; continuing without sound", e);
        if kind == ToneOutputKind::Midi {
            log::warn!("[tone] start a synthesiser such as `fluidsynth` or `timidity -iA`");
        }
        Box::new(NullTone)
    })
}

// ════════════════════════════════════════════════════════════════════════════
// OscillatorSink
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState { Stopped, Playing }

/// Sole owner of the instrument state.
///
/// Updates take effect immediately in either state; they are only audible
/// while [`PlayState::Playing`].
pub struct OscillatorSink {
    params: Arc<ToneParams>,
    range:  FrequencyRange,
    output: Box<dyn ToneOutput>,
}

impl OscillatorSink {
    pub fn new(
        range:     FrequencyRange,
        frequency: f64,
        amplitude: f32,
        params:    Arc<ToneParams>,
        output:    Box<dyn ToneOutput>,
    ) -> Self {
        let mut sink = OscillatorSink { params, range, output };
        sink.params.set_playing(false);
        sink.params.set_frequency(range.clamp(frequency));
        sink.params.set_amplitude(amplitude);
        sink.push();
        sink
    }

    /// A sink on [`NullTone`].
    pub fn silent(range: FrequencyRange, frequency: f64, amplitude: f32) -> Self {
        let params = Arc::new(ToneParams::new(range.clamp(frequency), amplitude));
        OscillatorSink::new(range, frequency, amplitude, params, Box::new(NullTone))
    }

    /// Set the frequency, clamped into the instrument's band.  Returns what
    /// was applied.
    pub fn set_frequency(&mut self, hz: f64) -> f64 {
        let hz = self.range.clamp(hz);
        self.params.set_frequency(hz);
        self.push();
        hz
    }

    /// Set the amplitude, clamped into `[0, 1]`.  NaN leaves it unchanged.
    pub fn set_amplitude(&mut self, amplitude: f32) -> f32 {
        self.params.set_amplitude(amplitude);
        self.push();
        self.params.amplitude()
    }

    /// `true` if this call started the tone.
    pub fn start(&mut self) -> bool {
        if self.params.is_playing() {
            return false;
        }
        self.params.set_playing(true);
        self.push();
        log::info!("[tone] playing");
        true
    }

    /// `true` if this call stopped the tone.
    pub fn stop(&mut self) -> bool {
        if !self.params.is_playing() {
            return false;
        }
        self.params.set_playing(false);
        self.push();
        log::info!("[tone] stopped");
        true
    }

    pub fn toggle(&mut self) -> PlayState {
        match self.state() {
            PlayState::Playing => { self.stop(); }
            PlayState::Stopped => { self.start(); }
        }
        self.state()
    }

    pub fn state(&self) -> PlayState {
        if self.params.is_playing() { PlayState::Playing } else { PlayState::Stopped }
    }

    pub fn instrument(&self) -> InstrumentState { self.params.snapshot() }

    pub fn range(&self) -> &FrequencyRange { &self.range }

    pub fn output_name(&self) -> &str { self.output.name() }

    fn push(&mut self) {
        let state = self.params.snapshot();
        self.output.update(&state);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
