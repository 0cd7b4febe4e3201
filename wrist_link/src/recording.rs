//! The sensing side's keep-alive session.
//!
//! A [`Recorder`] owns a motion sampler and a link.  While recording, each
//! [`tick`](Recorder::tick) takes one attitude sample and sends its pitch;
//! [`send_now`](Recorder::send_now) pushes the latest pitch on demand.

use theremin_map::{AttitudeSample, AttitudeSensor, MotionSampler};

use crate::error::LinkError;
use crate::session::{Link, SendOutcome, Session, SessionState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

pub struct Recorder<S: AttitudeSensor, T: Session> {
    sampler:       MotionSampler<S>,
    link:          Link<T>,
    state:         RecordingState,
    /// Motion was found unavailable; reported already.
    motion_failed: bool,
}

impl<S: AttitudeSensor, T: Session> Recorder<S, T> {
    pub fn new(sampler: MotionSampler<S>, link: Link<T>) -> Self {
        Recorder { sampler, link, state: RecordingState::Idle, motion_failed: false }
    }

    pub fn state(&self) -> RecordingState { self.state }

    pub fn is_recording(&self) -> bool { self.state == RecordingState::Recording }

    /// True when recording without a working motion sensor.
    pub fn is_degraded(&self) -> bool { self.motion_failed }

    /// Open the session and begin sampling.
    ///
    /// A session that cannot be activated is a startup error.  Missing
    /// motion hardware is not: it is reported once and the recorder keeps
    /// the session alive without sending samples.
    pub fn start(&mut self) -> Result<(), LinkError> {
        if self.state == RecordingState::Recording {
            return Ok(());
        }
        if self.link.activate()? != SessionState::Activated {
            return Err(LinkError::NotActivated);
        }
        if !self.motion_failed && self.sampler.start().is_err() {
            self.motion_failed = true;
        }
        self.state = RecordingState::Recording;
        log::info!("[motion] recording started");
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state == RecordingState::Idle {
            return;
        }
        self.sampler.stop();
        self.state = RecordingState::Idle;
        log::info!("[motion] recording stopped");
    }

    /// One sampling period: read the sensor and send what it reported.
    pub fn tick(&mut self) -> Option<SendOutcome> {
        if !self.is_recording() {
            return None;
        }
        let sample = self.sampler.sample()?;
        Some(self.send_sample(sample))
    }

    /// Send the latest pitch again, outside the periodic stream.
    pub fn send_now(&mut self) -> Option<SendOutcome> {
        if !self.is_recording() {
            return None;
        }
        let sample = self.sampler.latest()?;
        Some(self.send_sample(sample))
    }

    pub fn send_greeting(&mut self, text: &str) -> SendOutcome {
        self.link.send_greeting(text)
    }

    pub fn sampler(&self) -> &MotionSampler<S> { &self.sampler }
    pub fn link(&self)    -> &Link<T>          { &self.link }
    pub fn link_mut(&mut self) -> &mut Link<T> { &mut self.link }

    fn send_sample(&mut self, sample: AttitudeSample) -> SendOutcome {
        log::trace!("[motion] pitch {:+.3} rad", sample.pitch);
        self.link.send_value(sample.pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback;
    use crate::message::Payload;
    use std::time::Duration;
    use theremin_map::{NoSensor, SweepSensor, DEFAULT_INTERVAL};

    #[test]
    fn start_is_idempotent() {
        let (tx, _rx, _) = loopback::pair();
        let mut r = Recorder::new(
            MotionSampler::new(SweepSensor::new(8), DEFAULT_INTERVAL),
            Link::new(tx),
        );
        r.start().unwrap();
        r.start().unwrap();
        assert!(r.is_recording());
        r.stop();
        r.stop();
        assert_eq!(r.state(), RecordingState::Idle);
    }

    #[test]
    fn refused_session_is_a_startup_error() {
        let (tx, _rx, _) = loopback::pair();
        let mut r = Recorder::new(
            MotionSampler::new(SweepSensor::new(8), DEFAULT_INTERVAL),
            Link::new(tx.refusing()),
        );
        assert!(matches!(r.start(), Err(LinkError::NotActivated)));
        assert!(!r.is_recording());
    }

    #[test]
    fn missing_motion_degrades_without_failing() {
        let (tx, _rx, _) = loopback::pair();
        let mut r = Recorder::new(MotionSampler::new(NoSensor, DEFAULT_INTERVAL), Link::new(tx));
        r.start().unwrap();
        assert!(r.is_degraded());
        assert_eq!(r.tick(), None);
        assert_eq!(r.send_now(), None);
    }

    #[test]
    fn ticks_send_pitch_samples() {
        let (tx, mut rx, _) = loopback::pair();
        rx.activate().unwrap();
        let mut r = Recorder::new(
            MotionSampler::new(SweepSensor::new(4), DEFAULT_INTERVAL),
            Link::new(tx),
        );
        r.start().unwrap();
        assert_eq!(r.tick(), Some(SendOutcome::Sent));
        let bytes = rx.receive(Duration::from_millis(100)).unwrap().unwrap();
        assert!(matches!(Payload::decode(&bytes).unwrap(), Payload::Control(_)));
    }

    #[test]
    fn idle_recorder_sends_nothing() {
        let (tx, _rx, _) = loopback::pair();
        let mut r = Recorder::new(
            MotionSampler::new(SweepSensor::new(4), DEFAULT_INTERVAL),
            Link::new(tx),
        );
        assert_eq!(r.tick(), None);
        assert_eq!(r.link().sent(), 0);
    }

    #[test]
    fn send_now_repeats_latest_pitch() {
        let (tx, _rx, _) = loopback::pair();
        let mut r = Recorder::new(
            MotionSampler::new(SweepSensor::new(4), DEFAULT_INTERVAL),
            Link::new(tx),
        );
        r.start().unwrap();
        r.tick();
        assert_eq!(r.send_now(), Some(SendOutcome::Sent));
        assert_eq!(r.link().sent(), 2);
    }
}
