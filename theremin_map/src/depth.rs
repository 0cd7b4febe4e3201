//! Depth frame → volume estimate.
//!
//! A dense depth frame from the front camera is reduced to one number: the
//! mean distance of every pixel that falls inside the valid band.  That mean
//! is clamped to a playing zone and inverted onto `[0, 1]`, so a hand close
//! to the camera is loud and a hand far away is silent.
//!
//! Frames with too few valid pixels produce [`DepthReading::Insufficient`]
//! and must not touch the amplitude; [`VolumeTracker`] enforces that by
//! keeping the previous estimate.

use serde::{Deserialize, Serialize};

use crate::error::MapError;

// ════════════════════════════════════════════════════════════════════════════
// DepthUnit
// ════════════════════════════════════════════════════════════════════════════

/// Native unit of the samples in a [`DepthFrame`].
///
/// Policy constants are always expressed in millimetres; metre frames are
/// scaled on the way in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepthUnit {
    #[default]
    Millimeters,
    Meters,
}

impl DepthUnit {
    /// Convert one raw sample to millimetres.
    pub fn to_millimeters(self, raw: f32) -> f64 {
        match self {
            DepthUnit::Millimeters => raw as f64,
            DepthUnit::Meters      => raw as f64 * 1000.0,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DepthFrame
// ════════════════════════════════════════════════════════════════════════════

/// One capture from the depth camera.
///
/// Samples are row-major; `stride` is the number of `f32` samples between
/// the starts of consecutive rows and may exceed `width` (row padding).
/// Padding samples are never read.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthFrame {
    width:   usize,
    height:  usize,
    stride:  usize,
    unit:    DepthUnit,
    samples: Vec<f32>,
}

impl DepthFrame {
    pub fn new(
        width:   usize,
        height:  usize,
        stride:  usize,
        unit:    DepthUnit,
        samples: Vec<f32>,
    ) -> Result<Self, MapError> {
        if stride < width {
            return Err(MapError::StrideTooNarrow { stride, width });
        }
        let needed = if height == 0 { 0 } else { (height - 1) * stride + width };
        if samples.len() < needed {
            return Err(MapError::BufferTooSmall {
                width, height, stride, needed, actual: samples.len(),
            });
        }
        Ok(DepthFrame { width, height, stride, unit, samples })
    }

    /// A tightly packed frame with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, unit: DepthUnit, value: f32) -> Self {
        DepthFrame {
            width,
            height,
            stride: width,
            unit,
            samples: vec![value; width * height],
        }
    }

    pub fn width(&self)  -> usize     { self.width }
    pub fn height(&self) -> usize     { self.height }
    pub fn stride(&self) -> usize     { self.stride }
    pub fn unit(&self)   -> DepthUnit { self.unit }

    /// Total pixels, excluding row padding.
    pub fn pixel_count(&self) -> usize { self.width * self.height }

    /// Iterate the visible part of each row.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.height).map(move |y| {
            let start = y * self.stride;
            &self.samples[start..start + self.width]
        })
    }

    /// Mutable access to one pixel; used by simulated cameras to paint a hand.
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> Option<&mut f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples.get_mut(y * self.stride + x)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DepthPolicy
// ════════════════════════════════════════════════════════════════════════════

/// Constants that decide which pixels count and how distance maps to volume.
/// All distances are millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DepthPolicy {
    /// Samples below this are sensor noise.
    pub valid_min: f64,
    /// Samples above this are background.
    pub valid_max: f64,
    /// Frames with fewer valid pixels than this are rejected.
    pub min_valid_pixels: usize,
    /// Mean distance at (or nearer than) which the volume is 1.0.
    pub near: f64,
    /// Mean distance at (or beyond) which the volume is 0.0.
    pub far: f64,
}

impl Default for DepthPolicy {
    fn default() -> Self {
        DepthPolicy {
            valid_min:        250.0,
            valid_max:        6000.0,
            min_valid_pixels: 20_000,
            near:             600.0,
            far:              3600.0,
        }
    }
}

impl DepthPolicy {
    pub fn validate(&self) -> Result<(), MapError> {
        let all_finite = [self.valid_min, self.valid_max, self.near, self.far]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(MapError::InvalidPolicy("distances must be finite".into()));
        }
        if self.valid_min >= self.valid_max {
            return Err(MapError::InvalidPolicy(format!(
                "valid band {}..{} is empty", self.valid_min, self.valid_max
            )));
        }
        if self.near >= self.far {
            return Err(MapError::InvalidPolicy(format!(
                "near {} must be closer than far {}", self.near, self.far
            )));
        }
        if self.min_valid_pixels == 0 {
            return Err(MapError::InvalidPolicy("min_valid_pixels must be at least 1".into()));
        }
        Ok(())
    }

    /// True when `mm` lies inside the valid band (inclusive).  NaN never does.
    pub fn accepts(&self, mm: f64) -> bool {
        mm >= self.valid_min && mm <= self.valid_max
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VolumeEstimate / DepthReading
// ════════════════════════════════════════════════════════════════════════════

/// A volume in `[0, 1]`.  The constructor clamps, so a value of this type is
/// always in range and finite.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct VolumeEstimate(f32);

impl VolumeEstimate {
    pub const SILENT: VolumeEstimate = VolumeEstimate(0.0);
    pub const FULL:   VolumeEstimate = VolumeEstimate(1.0);

    pub fn new(volume: f32) -> Self {
        if volume.is_nan() {
            return VolumeEstimate::SILENT;
        }
        VolumeEstimate(volume.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 { self.0 }
}

/// Sum/count summary of the valid pixels in one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthStats {
    pub valid_pixels: usize,
    /// Mean valid depth in millimetres; `None` when no pixel passed.
    pub mean_mm: Option<f64>,
}

/// Result of reducing a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DepthReading {
    Volume {
        volume: VolumeEstimate,
        stats:  DepthStats,
    },
    /// Not enough valid pixels; callers must leave the amplitude alone.
    Insufficient {
        valid_pixels: usize,
        required:     usize,
    },
}

impl DepthReading {
    pub fn volume(&self) -> Option<VolumeEstimate> {
        match self {
            DepthReading::Volume { volume, .. } => Some(*volume),
            DepthReading::Insufficient { .. }   => None,
        }
    }

    pub fn valid_pixels(&self) -> usize {
        match self {
            DepthReading::Volume { stats, .. }            => stats.valid_pixels,
            DepthReading::Insufficient { valid_pixels, .. } => *valid_pixels,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DepthAverager
// ════════════════════════════════════════════════════════════════════════════

/// Stateless reducer from [`DepthFrame`] to [`DepthReading`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthAverager {
    policy: DepthPolicy,
}

impl Default for DepthAverager {
    fn default() -> Self {
        DepthAverager { policy: DepthPolicy::default() }
    }
}

impl DepthAverager {
    pub fn new(policy: DepthPolicy) -> Result<Self, MapError> {
        policy.validate()?;
        Ok(DepthAverager { policy })
    }

    pub fn policy(&self) -> &DepthPolicy { &self.policy }

    /// Sum and count the pixels inside the valid band.
    pub fn measure(&self, frame: &DepthFrame) -> DepthStats {
        let unit = frame.unit();
        let mut sum   = 0.0_f64;
        let mut count = 0_usize;
        for row in frame.rows() {
            for &raw in row {
                let mm = unit.to_millimeters(raw);
                if self.policy.accepts(mm) {
                    sum   += mm;
                    count += 1;
                }
            }
        }
        let mean_mm = if count == 0 { None } else { Some(sum / count as f64) };
        DepthStats { valid_pixels: count, mean_mm }
    }

    /// Reduce a frame to a volume, or reject it.
    pub fn estimate(&self, frame: &DepthFrame) -> DepthReading {
        let stats = self.measure(frame);
        match stats.mean_mm {
            Some(mean) if stats.valid_pixels >= self.policy.min_valid_pixels => {
                DepthReading::Volume { volume: self.volume_for_depth(mean), stats }
            }
            _ => DepthReading::Insufficient {
                valid_pixels: stats.valid_pixels,
                required:     self.policy.min_valid_pixels,
            },
        }
    }

    /// Clamp a mean distance to `[near, far]` and invert it onto `[0, 1]`.
    pub fn volume_for_depth(&self, mean_mm: f64) -> VolumeEstimate {
        let DepthPolicy { near, far, .. } = self.policy;
        let clamped = mean_mm.clamp(near, far);
        VolumeEstimate::new(((far - clamped) / (far - near)) as f32)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VolumeTracker
// ════════════════════════════════════════════════════════════════════════════

/// Holds the last good [`VolumeEstimate`] across frames.
#[derive(Clone, Debug)]
pub struct VolumeTracker {
    averager: DepthAverager,
    current:  Option<VolumeEstimate>,
    last:     Option<DepthReading>,
    rejected: u64,
}

impl VolumeTracker {
    pub fn new(averager: DepthAverager) -> Self {
        VolumeTracker { averager, current: None, last: None, rejected: 0 }
    }

    /// Feed one frame.  Returns the new estimate, or `None` when the frame
    /// was rejected and the previous estimate still stands.
    pub fn observe(&mut self, frame: &DepthFrame) -> Option<VolumeEstimate> {
        let reading = self.averager.estimate(frame);
        self.last = Some(reading);
        match reading.volume() {
            Some(v) => {
                self.current = Some(v);
                Some(v)
            }
            None => {
                self.rejected += 1;
                log::trace!(
                    "[depth] frame rejected: {} valid pixels",
                    reading.valid_pixels()
                );
                None
            }
        }
    }

    pub fn current(&self)       -> Option<VolumeEstimate> { self.current }
    pub fn last_reading(&self)  -> Option<DepthReading>   { self.last }
    pub fn rejected_frames(&self) -> u64                  { self.rejected }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_ge, assert_le};

    // 160 × 128 = 20 480 pixels, just over the default threshold.
    const W: usize = 160;
    const H: usize = 128;

    fn averager() -> DepthAverager { DepthAverager::default() }

    #[test]
    fn all_pixels_at_near_clamp_is_full_volume() {
        let frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, 600.0);
        let v = averager().estimate(&frame).volume().unwrap();
        assert!(approx_eq!(f32, v.value(), 1.0));
    }

    #[test]
    fn all_pixels_at_far_clamp_is_silent() {
        let frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, 3600.0);
        let v = averager().estimate(&frame).volume().unwrap();
        assert!(approx_eq!(f32, v.value(), 0.0));
    }

    #[test]
    fn nearer_than_near_still_full() {
        let frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, 300.0);
        assert_eq!(averager().estimate(&frame).volume(), Some(VolumeEstimate::FULL));
    }

    #[test]
    fn beyond_far_still_silent() {
        let frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, 5000.0);
        assert_eq!(averager().estimate(&frame).volume(), Some(VolumeEstimate::SILENT));
    }

    #[test]
    fn midpoint_is_half_volume() {
        let frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, 2100.0);
        let v = averager().estimate(&frame).volume().unwrap();
        assert!(approx_eq!(f32, v.value(), 0.5, epsilon = 1e-6));
    }

    #[test]
    fn metre_frames_are_scaled() {
        let frame = DepthFrame::filled(W, H, DepthUnit::Meters, 0.6);
        let v = averager().estimate(&frame).volume().unwrap();
        assert!(approx_eq!(f32, v.value(), 1.0, epsilon = 1e-5));
    }

    #[test]
    fn empty_frame_is_insufficient_not_nan() {
        let frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, 0.0);
        let reading = averager().estimate(&frame);
        assert_eq!(
            reading,
            DepthReading::Insufficient { valid_pixels: 0, required: 20_000 }
        );
        assert_eq!(averager().measure(&frame).mean_mm, None);
    }

    #[test]
    fn nan_and_out_of_band_pixels_are_ignored() {
        let mut frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, 1000.0);
        *frame.pixel_mut(0, 0).unwrap() = f32::NAN;
        *frame.pixel_mut(1, 0).unwrap() = 100.0;
        *frame.pixel_mut(2, 0).unwrap() = 9000.0;
        let stats = averager().measure(&frame);
        assert_eq!(stats.valid_pixels, W * H - 3);
        assert!(approx_eq!(f64, stats.mean_mm.unwrap(), 1000.0, epsilon = 1e-9));
    }

    #[test]
    fn padding_samples_are_skipped() {
        // Stride 4, width 2: columns 2 and 3 are padding full of garbage.
        let samples = vec![
            1000.0, 1000.0, 0.5, 99999.0,
            1000.0, 1000.0, 0.5, 99999.0,
        ];
        let frame = DepthFrame::new(2, 2, 4, DepthUnit::Millimeters, samples).unwrap();
        let stats = averager().measure(&frame);
        assert_eq!(stats.valid_pixels, 4);
    }

    #[test]
    fn below_threshold_is_rejected() {
        // 200 × 100 frame, only the first 25 rows (5 000 pixels) are in band.
        let mut frame = DepthFrame::filled(200, 100, DepthUnit::Millimeters, 0.0);
        for y in 0..25 {
            for x in 0..200 {
                *frame.pixel_mut(x, y).unwrap() = 800.0;
            }
        }
        let reading = averager().estimate(&frame);
        assert_eq!(reading.volume(), None);
        assert_eq!(reading.valid_pixels(), 5_000);
    }

    #[test]
    fn threshold_is_inclusive() {
        // 200 × 100 = exactly 20 000 pixels.
        let mut frame = DepthFrame::filled(200, 100, DepthUnit::Millimeters, 600.0);
        let reading = averager().estimate(&frame);
        assert_eq!(reading.valid_pixels(), 20_000);
        assert_eq!(reading.volume(), Some(VolumeEstimate::FULL));

        *frame.pixel_mut(0, 0).unwrap() = 0.0;
        let reading = averager().estimate(&frame);
        assert_eq!(reading.valid_pixels(), 19_999);
        assert_eq!(reading.volume(), None);
    }

    #[test]
    fn volume_always_in_unit_range() {
        let a = averager();
        for mm in [250.0_f32, 400.0, 600.0, 1234.5, 2999.0, 3600.0, 4000.0, 6000.0] {
            let frame = DepthFrame::filled(W, H, DepthUnit::Millimeters, mm);
            let v = a.estimate(&frame).volume().unwrap().value();
            assert_ge!(v, 0.0);
            assert_le!(v, 1.0);
        }
    }

    #[test]
    fn nearer_is_louder() {
        let a = averager();
        let near = a.volume_for_depth(1000.0);
        let far  = a.volume_for_depth(2000.0);
        assert!(near > far);
    }

    // ── VolumeTracker ─────────────────────────────────────────────────────

    #[test]
    fn tracker_keeps_previous_on_rejected_frame() {
        let mut t = VolumeTracker::new(averager());
        let good = DepthFrame::filled(W, H, DepthUnit::Millimeters, 2100.0);
        let first = t.observe(&good).unwrap();

        let mut sparse = DepthFrame::filled(200, 100, DepthUnit::Millimeters, 0.0);
        for x in 0..200 {
            for y in 0..25 {
                *sparse.pixel_mut(x, y).unwrap() = 700.0;
            }
        }
        assert_eq!(t.observe(&sparse), None);
        assert_eq!(t.current(), Some(first));
        assert_eq!(t.rejected_frames(), 1);
        assert!(matches!(t.last_reading(), Some(DepthReading::Insufficient { .. })));
    }

    #[test]
    fn tracker_starts_empty() {
        let mut t = VolumeTracker::new(averager());
        let blank = DepthFrame::filled(W, H, DepthUnit::Millimeters, f32::NAN);
        assert_eq!(t.observe(&blank), None);
        assert_eq!(t.current(), None);
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn short_buffer_is_an_error() {
        let err = DepthFrame::new(4, 4, 4, DepthUnit::Millimeters, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, MapError::BufferTooSmall { needed: 16, actual: 15, .. }));
    }

    #[test]
    fn last_row_needs_no_padding() {
        assert!(DepthFrame::new(2, 2, 4, DepthUnit::Millimeters, vec![0.0; 6]).is_ok());
    }

    #[test]
    fn narrow_stride_is_an_error() {
        let err = DepthFrame::new(4, 1, 3, DepthUnit::Millimeters, vec![0.0; 4]).unwrap_err();
        assert_eq!(err, MapError::StrideTooNarrow { stride: 3, width: 4 });
    }

    #[test]
    fn inverted_policy_is_rejected() {
        let policy = DepthPolicy { near: 3600.0, far: 600.0, ..DepthPolicy::default() };
        assert!(DepthAverager::new(policy).is_err());
    }

    #[test]
    fn nan_volume_becomes_silent() {
        assert_eq!(VolumeEstimate::new(f32::NAN), VolumeEstimate::SILENT);
        assert_eq!(VolumeEstimate::new(7.0), VolumeEstimate::FULL);
    }
}
