//! Normalised control value → oscillator frequency.
//!
//! ```text
//! hz = min + (clamp(x, -1, 1) + 1) * (max - min) / 2
//! ```
//!
//! The mapping is total: every `f64`, including NaN and the infinities,
//! lands inside `[min, max]`.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::error::MapError;

// ════════════════════════════════════════════════════════════════════════════
// FrequencyRange
// ════════════════════════════════════════════════════════════════════════════

/// The instrument's working band, in Hz.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyRange {
    min_hz: f64,
    max_hz: f64,
}

impl Default for FrequencyRange {
    fn default() -> Self { FrequencyRange::theremin() }
}

impl FrequencyRange {
    pub fn new(min_hz: f64, max_hz: f64) -> Result<Self, MapError> {
        if !min_hz.is_finite() || !max_hz.is_finite() || min_hz <= 0.0 || min_hz >= max_hz {
            return Err(MapError::InvalidRange { min_hz, max_hz });
        }
        Ok(FrequencyRange { min_hz, max_hz })
    }

    /// 250 Hz – 1050 Hz.
    pub const fn theremin() -> Self {
        FrequencyRange { min_hz: 250.0, max_hz: 1050.0 }
    }

    pub fn min_hz(&self)   -> f64 { self.min_hz }
    pub fn max_hz(&self)   -> f64 { self.max_hz }
    pub fn span(&self)     -> f64 { self.max_hz - self.min_hz }
    pub fn midpoint(&self) -> f64 { self.min_hz + self.span() / 2.0 }

    pub fn contains(&self, hz: f64) -> bool {
        hz >= self.min_hz && hz <= self.max_hz
    }

    /// Pull `hz` into the band.  NaN becomes the lower edge.
    pub fn clamp(&self, hz: f64) -> f64 {
        if hz.is_nan() {
            return self.min_hz;
        }
        hz.clamp(self.min_hz, self.max_hz)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// InputScale
// ════════════════════════════════════════════════════════════════════════════

/// How a raw transported value becomes a normalised `[-1, 1]` input.
///
/// The wrist sends its pitch angle in radians, untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputScale {
    /// Use the angle as-is; the band saturates beyond ±1 rad (≈ ±57°).
    #[default]
    Radians,
    /// Divide by π/2 so a full ±90° wrist tilt covers the band.
    QuarterTurn,
}

impl InputScale {
    pub fn normalize(self, raw: f64) -> f64 {
        match self {
            InputScale::Radians     => raw,
            InputScale::QuarterTurn => raw / FRAC_PI_2,
        }
    }
}

/// Clamp to `[-1, 1]`; NaN maps to the centre.
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(-1.0, 1.0)
}

// ════════════════════════════════════════════════════════════════════════════
// ParameterMapper
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParameterMapper {
    range: FrequencyRange,
    scale: InputScale,
}

impl ParameterMapper {
    pub fn new(range: FrequencyRange, scale: InputScale) -> Self {
        ParameterMapper { range, scale }
    }

    pub fn range(&self) -> &FrequencyRange { &self.range }
    pub fn scale(&self) -> InputScale      { self.scale }

    /// Map a normalised input onto the band.
    pub fn map(&self, input: f64) -> f64 {
        let x = clamp_unit(input);
        if x >= 1.0 {
            return self.range.max_hz;
        }
        let hz = self.range.min_hz + (x + 1.0) * (self.range.span() / 2.0);
        self.range.clamp(hz)
    }

    /// Apply the configured [`InputScale`], then [`map`](Self::map).
    pub fn map_raw(&self, raw: f64) -> f64 {
        self.map(self.scale.normalize(raw))
    }

    /// Inverse of [`map`](Self::map) for frequencies inside the band.
    pub fn invert(&self, hz: f64) -> f64 {
        let hz = self.range.clamp(hz);
        clamp_unit((hz - self.range.min_hz) * 2.0 / self.range.span() - 1.0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_ge, assert_le};

    fn mapper() -> ParameterMapper { ParameterMapper::default() }

    #[test]
    fn endpoints_are_exact() {
        let m = mapper();
        assert_eq!(m.map(-1.0), 250.0);
        assert_eq!(m.map(1.0), 1050.0);
        assert_eq!(m.map(0.0), 650.0);
    }

    #[test]
    fn endpoints_exact_for_awkward_band() {
        let m = ParameterMapper::new(
            FrequencyRange::new(110.1, 987.7).unwrap(),
            InputScale::Radians,
        );
        assert_eq!(m.map(-1.0), 110.1);
        assert_eq!(m.map(1.0), 987.7);
    }

    #[test]
    fn out_of_range_inputs_saturate() {
        let m = mapper();
        assert_eq!(m.map(-40.0), 250.0);
        assert_eq!(m.map(3.5), 1050.0);
        assert_eq!(m.map(f64::INFINITY), 1050.0);
        assert_eq!(m.map(f64::NEG_INFINITY), 250.0);
    }

    #[test]
    fn nan_maps_to_midpoint() {
        assert_eq!(mapper().map(f64::NAN), 650.0);
    }

    #[test]
    fn monotonic_and_bounded() {
        let m = mapper();
        let mut prev = f64::NEG_INFINITY;
        for i in -300..=300 {
            let x = i as f64 / 100.0;
            let hz = m.map(x);
            assert_ge!(hz, prev);
            assert_ge!(hz, 250.0);
            assert_le!(hz, 1050.0);
            prev = hz;
        }
    }

    #[test]
    fn invert_round_trips_inside_band() {
        let m = mapper();
        for x in [-1.0, -0.5, 0.0, 0.25, 0.9, 1.0] {
            assert!(approx_eq!(f64, m.invert(m.map(x)), x, epsilon = 1e-12));
        }
    }

    #[test]
    fn quarter_turn_scale_spans_ninety_degrees() {
        let m = ParameterMapper::new(FrequencyRange::theremin(), InputScale::QuarterTurn);
        assert_eq!(m.map_raw(FRAC_PI_2), 1050.0);
        assert_eq!(m.map_raw(-FRAC_PI_2), 250.0);
        assert!(approx_eq!(f64, m.map_raw(FRAC_PI_2 / 2.0), 850.0, epsilon = 1e-9));
    }

    #[test]
    fn radians_scale_saturates_past_one_radian() {
        let m = mapper();
        assert_eq!(m.map_raw(1.2), 1050.0);
        assert!(approx_eq!(f64, m.map_raw(0.5), 850.0, epsilon = 1e-9));
    }

    #[test]
    fn bad_ranges_rejected() {
        assert!(FrequencyRange::new(500.0, 500.0).is_err());
        assert!(FrequencyRange::new(900.0, 100.0).is_err());
        assert!(FrequencyRange::new(0.0, 100.0).is_err());
        assert!(FrequencyRange::new(100.0, f64::NAN).is_err());
    }

    #[test]
    fn range_clamp_handles_nan() {
        let r = FrequencyRange::theremin();
        assert_eq!(r.clamp(f64::NAN), 250.0);
        assert_eq!(r.clamp(2000.0), 1050.0);
        assert!(r.contains(r.midpoint()));
    }
}
