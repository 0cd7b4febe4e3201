//! Shared tone parameters and the sine voice that renders them.
//!
//! Frequency, amplitude and the playing flag are three independent atomics.
//! Writers on any thread store a field; the audio callback loads each field
//! once per buffer.  No field is ever read-modify-written together with
//! another, so no lock is needed.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

// ════════════════════════════════════════════════════════════════════════════
// ToneParams
// ════════════════════════════════════════════════════════════════════════════

/// Snapshot of the instrument's two scalars and its playing flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstrumentState {
    pub frequency: f64,
    pub amplitude: f32,
    pub playing:   bool,
}

#[derive(Debug)]
pub struct ToneParams {
    frequency: AtomicU64,
    amplitude: AtomicU32,
    playing:   AtomicBool,
}

impl ToneParams {
    pub fn new(frequency: f64, amplitude: f32) -> Self {
        let p = ToneParams {
            frequency: AtomicU64::new(0.0_f64.to_bits()),
            amplitude: AtomicU32::new(0.0_f32.to_bits()),
            playing:   AtomicBool::new(false),
        };
        p.set_frequency(frequency);
        p.set_amplitude(amplitude);
        p
    }

    /// Store a new frequency.  Non-finite or negative values are ignored.
    pub fn set_frequency(&self, hz: f64) -> bool {
        if !hz.is_finite() || hz < 0.0 {
            return false;
        }
        self.frequency.store(hz.to_bits(), Ordering::Relaxed);
        true
    }

    /// Store a new amplitude, clamped into `[0, 1]`.  NaN is ignored.
    pub fn set_amplitude(&self, amplitude: f32) -> bool {
        if amplitude.is_nan() {
            return false;
        }
        self.amplitude.store(amplitude.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        true
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Relaxed);
    }

    pub fn frequency(&self) -> f64 {
        f64::from_bits(self.frequency.load(Ordering::Relaxed))
    }

    pub fn amplitude(&self) -> f32 {
        f32::from_bits(self.amplitude.load(Ordering::Relaxed))
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> InstrumentState {
        InstrumentState {
            frequency: self.frequency(),
            amplitude: self.amplitude(),
            playing:   self.is_playing(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SineVoice
// ════════════════════════════════════════════════════════════════════════════

/// Phase-accumulating sine generator.
///
/// Parameter changes take effect at the next buffer boundary with no ramp.
#[derive(Clone, Debug)]
pub struct SineVoice {
    sample_rate: f64,
    phase:       f64,
}

impl SineVoice {
    pub fn new(sample_rate: u32) -> Self {
        SineVoice { sample_rate: sample_rate.max(1) as f64, phase: 0.0 }
    }

    pub fn sample_rate(&self) -> f64 { self.sample_rate }

    /// Fill an interleaved buffer of `channels` channels from `params`.
    /// Silence while not playing; the phase is held so restarts are clean.
    pub fn render(&mut self, params: &ToneParams, out: &mut [f32], channels: usize) {
        let state = params.snapshot();
        let channels = channels.max(1);
        if !state.playing {
            out.fill(0.0);
            return;
        }
        let step = std::f64::consts::TAU * state.frequency / self.sample_rate;
        for frame in out.chunks_mut(channels) {
            let s = (self.phase.sin() as f32) * state.amplitude;
            frame.fill(s);
            self.phase += step;
            if self.phase >= std::f64::consts::TAU {
                self.phase -= std::f64::consts::TAU;
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
