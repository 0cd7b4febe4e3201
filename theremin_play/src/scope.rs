//! Oscilloscope trace and colour helpers for the visualizer.
//!
//! The trace is not the audio signal; it is a slowed-down picture of it.
//! Frequency sets how many cycles fit across the screen, amplitude sets the
//! height, and the phase scrolls a little each frame.

use std::f32::consts::TAU;

use theremin_map::InstrumentState;

// ════════════════════════════════════════════════════════════════════════════
// Color palette
// ════════════════════════════════════════════════════════════════════════════

/// Colour for a position `t` in `[0, 1]` across the frequency band: red at
/// the bottom through violet at the top.
pub fn band_color(t: f32) -> u32 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    hsv_to_argb(t * 280.0, 0.82, 0.92)
}

/// HSV (hue in degrees) to opaque `0xAARRGGBB`.
fn hsv_to_argb(h: f32, s: f32, v: f32) -> u32 {
    let chroma = v * s;
    let sector = h.rem_euclid(360.0) / 60.0;
    let second = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, second, 0.0),
        1 => (second, chroma, 0.0),
        2 => (0.0, chroma, second),
        3 => (0.0, second, chroma),
        4 => (second, 0.0, chroma),
        _ => (chroma, 0.0, second),
    };
    let lift = v - chroma;
    let byte = |c: f32| (((c + lift) * 255.0).round() as u32).min(255);
    0xFF00_0000 | byte(r) << 16 | byte(g) << 8 | byte(b)
}

// ════════════════════════════════════════════════════════════════════════════
// ScopeTrace
// ════════════════════════════════════════════════════════════════════════════

/// Hz per displayed cycle: 250 Hz shows 2.5 cycles, 1050 Hz shows 10.5.
const HZ_PER_CYCLE: f64 = 100.0;

/// Phase advanced per frame, in cycles.
const SCROLL: f32 = 0.04;

#[derive(Debug)]
pub struct ScopeTrace {
    /// One sample per column, in `[-1, 1]`.
    pub points: Vec<f32>,
    /// Height currently drawn; eases toward the real amplitude.
    pub shown_amplitude: f32,
    phase: f32,
}

impl ScopeTrace {
    pub fn new(width: usize) -> Self {
        ScopeTrace {
            points:          vec![0.0; width.max(1)],
            shown_amplitude: 0.0,
            phase:           0.0,
        }
    }

    /// Advance the animation by one frame.
    pub fn tick(&mut self, state: &InstrumentState) {
        let target = if state.playing { state.amplitude.clamp(0.0, 1.0) } else { 0.0 };
        self.shown_amplitude += (target - self.shown_amplitude) * 0.25;
        if (self.shown_amplitude - target).abs() < 1e-3 {
            self.shown_amplitude = target;
        }

        let cycles = (state.frequency / HZ_PER_CYCLE) as f32;
        self.phase = (self.phase + SCROLL * TAU) % TAU;

        let n = self.points.len() as f32;
        for (i, p) in self.points.iter_mut().enumerate() {
            let x = i as f32 / n;
            *p = self.shown_amplitude * (TAU * cycles * x + self.phase).sin();
        }
    }

    /// Number of rising zero crossings on screen.
    pub fn cycles_shown(&self) -> usize {
        self.points.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
