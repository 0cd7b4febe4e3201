//! Wrist attitude sampling.
//!
//! [`MotionSampler`] polls an [`AttitudeSensor`] at a fixed interval and
//! keeps only the latest pitch.  No normalisation happens here; the angle
//! leaves in radians exactly as the sensor reported it.

use std::f64::consts::FRAC_PI_2;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::MotionError;

/// Default sampling cadence: ten samples per second.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Seconds since the Unix epoch, as carried in transport timestamps.
pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ════════════════════════════════════════════════════════════════════════════
// Attitude
// ════════════════════════════════════════════════════════════════════════════

/// Device orientation, in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Attitude {
    pub roll:  f64,
    pub pitch: f64,
    pub yaw:   f64,
}

/// One pitch reading and when it was taken.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttitudeSample {
    pub pitch:       f64,
    /// Seconds since the Unix epoch.
    pub captured_at: f64,
}

// ════════════════════════════════════════════════════════════════════════════
// AttitudeSensor
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can report device attitude.
pub trait AttitudeSensor: Send {
    /// Whether the hardware exists at all.  Checked once, at start.
    fn is_available(&self) -> bool;

    /// Current attitude, or `None` if no reading is ready this tick.
    fn read(&mut self) -> Option<Attitude>;
}

impl AttitudeSensor for Box<dyn AttitudeSensor> {
    fn is_available(&self) -> bool            { (**self).is_available() }
    fn read(&mut self) -> Option<Attitude>    { (**self).read() }
}

/// A sensor that sweeps pitch back and forth between ±90°.
///
/// Stands in for a wrist when no motion hardware is attached.
#[derive(Clone, Debug)]
pub struct SweepSensor {
    /// Radians of phase advanced per read.
    step:  f64,
    phase: f64,
}

impl SweepSensor {
    /// `period_reads` reads make one full sweep.
    pub fn new(period_reads: u32) -> Self {
        let step = std::f64::consts::TAU / period_reads.max(1) as f64;
        SweepSensor { step, phase: 0.0 }
    }
}

impl AttitudeSensor for SweepSensor {
    fn is_available(&self) -> bool { true }

    fn read(&mut self) -> Option<Attitude> {
        let pitch = self.phase.sin() * FRAC_PI_2;
        let roll  = (self.phase * 0.5).sin() * 0.2;
        self.phase = (self.phase + self.step) % std::f64::consts::TAU;
        Some(Attitude { roll, pitch, yaw: 0.0 })
    }
}

/// A sensor that does not exist.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSensor;

impl AttitudeSensor for NoSensor {
    fn is_available(&self) -> bool         { false }
    fn read(&mut self) -> Option<Attitude> { None }
}

// ════════════════════════════════════════════════════════════════════════════
// MotionSampler
// ════════════════════════════════════════════════════════════════════════════

/// Fixed-cadence pitch sampler.
///
/// The caller drives the clock: call [`sample`](Self::sample) once per
/// [`interval`](Self::interval).  The interval is fixed at construction.
pub struct MotionSampler<S: AttitudeSensor> {
    sensor:   S,
    interval: Duration,
    active:   bool,
    attitude: Option<Attitude>,
    latest:   Option<AttitudeSample>,
}

impl<S: AttitudeSensor> MotionSampler<S> {
    pub fn new(sensor: S, interval: Duration) -> Self {
        MotionSampler {
            sensor,
            interval,
            active:   false,
            attitude: None,
            latest:   None,
        }
    }

    pub fn interval(&self)  -> Duration               { self.interval }
    pub fn is_active(&self) -> bool                   { self.active }
    pub fn latest(&self)    -> Option<AttitudeSample> { self.latest }
    pub fn attitude(&self)  -> Option<Attitude>       { self.attitude }

    /// Begin sampling.  Reports an unavailable sensor once and stays idle;
    /// there is no retry.
    pub fn start(&mut self) -> Result<(), MotionError> {
        if self.active {
            return Ok(());
        }
        if !self.sensor.is_available() {
            log::warn!("[motion] device motion not available; wrist control disabled");
            return Err(MotionError::Unavailable);
        }
        log::info!("[motion] sampling every {} ms", self.interval.as_millis());
        self.active = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.active {
            log::info!("[motion] sampling stopped");
        }
        self.active = false;
    }

    /// Take one reading.  Overwrites the previous sample; nothing older is
    /// kept.
    pub fn sample(&mut self) -> Option<AttitudeSample> {
        if !self.active {
            return None;
        }
        let attitude = self.sensor.read()?;
        let sample = AttitudeSample { pitch: attitude.pitch, captured_at: epoch_seconds() };
        self.attitude = Some(attitude);
        self.latest   = Some(sample);
        Some(sample)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_gt, assert_le};

    struct Scripted(Vec<f64>);

    impl AttitudeSensor for Scripted {
        fn is_available(&self) -> bool { true }
        fn read(&mut self) -> Option<Attitude> {
            if self.0.is_empty() {
                return None;
            }
            Some(Attitude { pitch: self.0.remove(0), ..Attitude::default() })
        }
    }

    #[test]
    fn unavailable_sensor_refuses_to_start() {
        let mut s = MotionSampler::new(NoSensor, DEFAULT_INTERVAL);
        assert_eq!(s.start(), Err(MotionError::Unavailable));
        assert!(!s.is_active());
        assert_eq!(s.sample(), None);
    }

    #[test]
    fn idle_sampler_produces_nothing() {
        let mut s = MotionSampler::new(Scripted(vec![0.3]), DEFAULT_INTERVAL);
        assert_eq!(s.sample(), None);
    }

    #[test]
    fn pitch_passes_through_unscaled() {
        let mut s = MotionSampler::new(Scripted(vec![2.5, -0.75]), DEFAULT_INTERVAL);
        s.start().unwrap();
        assert_eq!(s.sample().unwrap().pitch, 2.5);
        assert_eq!(s.sample().unwrap().pitch, -0.75);
        assert_eq!(s.latest().unwrap().pitch, -0.75);
    }

    #[test]
    fn empty_read_keeps_latest() {
        let mut s = MotionSampler::new(Scripted(vec![0.1]), DEFAULT_INTERVAL);
        s.start().unwrap();
        s.sample();
        assert_eq!(s.sample(), None);
        assert_eq!(s.latest().unwrap().pitch, 0.1);
    }

    #[test]
    fn stop_halts_sampling() {
        let mut s = MotionSampler::new(Scripted(vec![0.1, 0.2]), DEFAULT_INTERVAL);
        s.start().unwrap();
        s.stop();
        assert_eq!(s.sample(), None);
    }

    #[test]
    fn samples_are_timestamped() {
        let mut s = MotionSampler::new(Scripted(vec![0.0]), DEFAULT_INTERVAL);
        s.start().unwrap();
        assert_gt!(s.sample().unwrap().captured_at, 1.0e9);
    }

    #[test]
    fn sweep_stays_within_quarter_turn() {
        let mut sensor = SweepSensor::new(40);
        for _ in 0..100 {
            let a = sensor.read().unwrap();
            assert_le!(a.pitch.abs(), FRAC_PI_2 + 1e-12);
        }
    }
}
