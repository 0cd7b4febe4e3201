//! Sensor inputs: depth frames for volume, wrist attitude for pitch.
//!
//! Both come from real hardware or from keyboard simulation, and consumers
//! do not need to know which:
//!
//! * a [`DepthSource`] pushes frames to a worker thread that reduces each
//!   one to a [`VolumeEstimate`] and publishes it into a one-slot channel;
//! * the simulated wrist is a [`Recorder`] on its own thread, sending its
//!   pitch through a real [`Link`], exactly as the `wrist` binary does.

use std::f64::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use theremin_map::{
    latest, Attitude, AttitudeSensor, DepthAverager, DepthFrame, DepthUnit, MotionSampler,
    Subscriber, VolumeEstimate, VolumeTracker,
};
use wrist_link::{Link, LinkError, LoopbackControl, Recorder, Session};

use crate::error::CaptureError;

// ════════════════════════════════════════════════════════════════════════════
// SimInput: keyboard events from the visualizer window
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimInput {
    KeyDown(SimKey),
    /// The window was closed.
    Close,
}

/// Simulated key codes (mapped from minifb Key).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    HandNearer,   // W
    HandFarther,  // S
    HandToggle,   // H
    TiltUp,       // Up
    TiltDown,     // Down
    Level,        // L
    PlayToggle,   // Space
    SwitchView,   // V
    LinkToggle,   // U
    Quit,         // Q / Escape
}

// ════════════════════════════════════════════════════════════════════════════
// Shared simulation controls
// ════════════════════════════════════════════════════════════════════════════

/// Distance of the simulated hand from the camera.
#[derive(Clone, Debug)]
pub struct HandControl {
    distance_mm: Arc<AtomicU64>,
    present:     Arc<AtomicBool>,
}

impl HandControl {
    pub const NEAREST:  f64 = 150.0;
    pub const FARTHEST: f64 = 5000.0;

    pub fn new(distance_mm: f64) -> Self {
        let h = HandControl {
            distance_mm: Arc::new(AtomicU64::new(0)),
            present:     Arc::new(AtomicBool::new(true)),
        };
        h.set_distance(distance_mm);
        h
    }

    pub fn set_distance(&self, mm: f64) {
        if mm.is_nan() {
            return;
        }
        let mm = mm.clamp(Self::NEAREST, Self::FARTHEST);
        self.distance_mm.store(mm.to_bits(), Ordering::Relaxed);
    }

    pub fn nudge(&self, delta_mm: f64) {
        self.set_distance(self.distance() + delta_mm);
    }

    pub fn distance(&self) -> f64 {
        f64::from_bits(self.distance_mm.load(Ordering::Relaxed))
    }

    pub fn set_present(&self, present: bool) {
        self.present.store(present, Ordering::Relaxed);
    }

    pub fn is_present(&self) -> bool {
        self.present.load(Ordering::Relaxed)
    }
}

/// Tilt of the simulated wrist, radians.
#[derive(Clone, Debug, Default)]
pub struct WristControl {
    pitch: Arc<AtomicU64>,
}

impl WristControl {
    pub fn set_pitch(&self, radians: f64) {
        if radians.is_nan() {
            return;
        }
        let r = radians.clamp(-FRAC_PI_2, FRAC_PI_2);
        self.pitch.store(r.to_bits(), Ordering::Relaxed);
    }

    pub fn tilt(&self, delta: f64) {
        self.set_pitch(self.pitch() + delta);
    }

    pub fn pitch(&self) -> f64 {
        f64::from_bits(self.pitch.load(Ordering::Relaxed))
    }
}

/// Everything the keyboard can reach while simulating.
#[derive(Clone, Debug)]
pub struct SimControls {
    pub hand:  HandControl,
    pub wrist: WristControl,
    /// Present only when the wrist runs over a loopback pair.
    pub link:  Option<LoopbackControl>,
}

impl Default for SimControls {
    fn default() -> Self {
        SimControls {
            hand:  HandControl::new(2000.0),
            wrist: WristControl::default(),
            link:  None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DepthSource
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver depth frames.
///
/// `run` pushes frames until the receiver goes away.  A full channel means
/// the consumer is behind; the frame is dropped, as a camera would.
pub trait DepthSource: Send + 'static {
    fn run(self: Box<Self>, frames: SyncSender<DepthFrame>) -> Result<(), CaptureError>;
}

/// Deliver `frame`; `false` once nobody is listening.
fn offer(frames: &SyncSender<DepthFrame>, frame: DepthFrame) -> bool {
    match frames.try_send(frame) {
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Disconnected(_))  => false,
    }
}

/// A depth camera that sees one flat hand against a far wall.
pub struct SimDepthCamera {
    pub width:  usize,
    pub height: usize,
    pub unit:   DepthUnit,
    pub period: Duration,
    pub hand:   HandControl,
}

impl SimDepthCamera {
    /// Background beyond the valid band.
    const WALL_MM: f64 = 8000.0;

    pub fn new(hand: HandControl) -> Self {
        SimDepthCamera {
            width:  320,
            height: 240,
            unit:   DepthUnit::Millimeters,
            period: Duration::from_millis(33),
            hand,
        }
    }

    /// One frame.  The hand fills the middle of the image; the border is
    /// wall, and every 97th pixel is a sensor dropout.
    pub fn render(&self) -> DepthFrame {
        let to_unit = |mm: f64| match self.unit {
            DepthUnit::Millimeters => mm as f32,
            DepthUnit::Meters      => (mm / 1000.0) as f32,
        };
        let wall = to_unit(Self::WALL_MM);
        let mut frame = DepthFrame::filled(self.width, self.height, self.unit, wall);
        let (mx, my) = (self.width / 8, self.height / 8);

        if self.hand.is_present() {
            let hand = to_unit(self.hand.distance());
            for y in my..self.height - my {
                for x in mx..self.width - mx {
                    if let Some(p) = frame.pixel_mut(x, y) {
                        *p = hand;
                    }
                }
            }
        }
        for i in (0..self.width * self.height).step_by(97) {
            if let Some(p) = frame.pixel_mut(i % self.width, i / self.width) {
                *p = 0.0;
            }
        }
        frame
    }
}

impl DepthSource for SimDepthCamera {
    fn run(self: Box<Self>, frames: SyncSender<DepthFrame>) -> Result<(), CaptureError> {
        log::info!("[depth] simulated camera {}x{}", self.width, self.height);
        loop {
            if !offer(&frames, self.render()) {
                return Ok(());
            }
            thread::sleep(self.period);
        }
    }
}

/// A device without a depth camera.
pub struct NoDepthCamera;

impl DepthSource for NoDepthCamera {
    fn run(self: Box<Self>, _frames: SyncSender<DepthFrame>) -> Result<(), CaptureError> {
        Err(CaptureError::Unavailable("this device has no depth camera".into()))
    }
}

/// Frames replayed from memory; the source ends when the list does.
pub struct ReplayDepth {
    pub frames: Vec<DepthFrame>,
    pub period: Duration,
}

impl DepthSource for ReplayDepth {
    fn run(self: Box<Self>, frames: SyncSender<DepthFrame>) -> Result<(), CaptureError> {
        for frame in self.frames {
            // Blocking send: replayed frames are never dropped.
            if frames.send(frame).is_err() {
                break;
            }
            thread::sleep(self.period);
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DepthWorker
// ════════════════════════════════════════════════════════════════════════════

/// Counters shared with the worker thread.
#[derive(Debug, Default)]
pub struct DepthDiagnostics {
    pub frames:       AtomicU64,
    pub rejected:     AtomicU64,
    /// Valid pixels in the most recent frame.
    pub valid_pixels: AtomicUsize,
    pub unavailable:  AtomicBool,
}

/// Handle to the depth pipeline's threads.
pub struct DepthWorker {
    volume: Subscriber<VolumeEstimate>,
    diag:   Arc<DepthDiagnostics>,
    handle: Option<JoinHandle<()>>,
}

/// Run `source` on one thread and the averaging on another.
///
/// Frames cross a two-deep channel; volumes cross a one-slot channel, so the
/// consumer only ever sees the newest.  Rejected frames publish nothing.
pub fn spawn_depth_worker(source: Box<dyn DepthSource>, averager: DepthAverager) -> DepthWorker {
    let (frame_tx, frame_rx) = mpsc::sync_channel::<DepthFrame>(2);
    let (publisher, volume)  = latest::<VolumeEstimate>();
    let diag = Arc::new(DepthDiagnostics::default());

    {
        let diag = Arc::clone(&diag);
        thread::spawn(move || {
            // Held until the flag is set, so the worker outlives the report.
            let keep_open = frame_tx.clone();
            if let Err(e) = source.run(frame_tx) {
                log::warn!("[depth] {}; amplitude holds its last value", e);
                diag.unavailable.store(true, Ordering::Relaxed);
            }
            drop(keep_open);
        });
    }

    let handle = {
        let diag = Arc::clone(&diag);
        thread::spawn(move || {
            let mut tracker   = VolumeTracker::new(averager);
            let mut rejecting = false;
            for frame in frame_rx {
                diag.frames.fetch_add(1, Ordering::Relaxed);
                let update = tracker.observe(&frame);
                if let Some(reading) = tracker.last_reading() {
                    diag.valid_pixels.store(reading.valid_pixels(), Ordering::Relaxed);
                }
                match update {
                    Some(v) => {
                        if rejecting {
                            log::debug!("[depth] hand back in view");
                            rejecting = false;
                        }
                        if !publisher.publish(v) {
                            return;
                        }
                    }
                    None => {
                        diag.rejected.fetch_add(1, Ordering::Relaxed);
                        if !rejecting {
                            log::debug!("[depth] too few valid pixels; holding volume");
                            rejecting = true;
                        }
                        if !publisher.is_connected() {
                            return;
                        }
                    }
                }
            }
        })
    };

    DepthWorker { volume, diag, handle: Some(handle) }
}

impl DepthWorker {
    /// Newest volume since the last call.
    pub fn take_volume(&self) -> Option<VolumeEstimate> {
        self.volume.take()
    }

    pub fn take_volume_timeout(&self, timeout: Duration) -> Option<VolumeEstimate> {
        self.volume.take_timeout(timeout)
    }

    pub fn diagnostics(&self) -> &DepthDiagnostics { &self.diag }

    pub fn is_unavailable(&self) -> bool {
        self.diag.unavailable.load(Ordering::Relaxed)
    }

    /// True once the source has ended and every volume has been taken.
    pub fn is_finished(&self) -> bool {
        self.volume.is_closed()
    }

    /// Wait for the averaging thread after the source has ended.
    pub fn join(mut self) {
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::error!("[depth] worker thread panicked");
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Simulated wrist
// ════════════════════════════════════════════════════════════════════════════

/// Attitude sensor whose pitch is set from the keyboard.
pub struct SimWrist {
    control: WristControl,
}

impl SimWrist {
    pub fn new(control: WristControl) -> Self { SimWrist { control } }
}

impl AttitudeSensor for SimWrist {
    fn is_available(&self) -> bool { true }

    fn read(&mut self) -> Option<Attitude> {
        Some(Attitude { pitch: self.control.pitch(), ..Attitude::default() })
    }
}

/// Handle to the simulated wrist's sampling thread.  Dropping it stops the
/// thread.
pub struct WristThread {
    stop:   Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

/// Start a [`Recorder`] over `session` fed by `control`, ticking every
/// `interval` on its own thread.
pub fn spawn_sim_wrist<S: Session + 'static>(
    control:  WristControl,
    session:  S,
    interval: Duration,
) -> Result<WristThread, LinkError> {
    let sampler = MotionSampler::new(SimWrist::new(control), interval);
    let mut recorder = Recorder::new(sampler, Link::new(session));
    recorder.start()?;

    let stop = Arc::new(AtomicBool::new(false));
    let handle = {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("sim-wrist".into())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    recorder.tick();
                    thread::sleep(interval);
                }
                recorder.stop();
            })?
    };
    Ok(WristThread { stop, handle: Some(handle) })
}

impl Drop for WristThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::error!("[motion] wrist thread panicked");
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::assert_ge;
    use theremin_map::DepthPolicy;

    #[test]
    fn hand_distance_is_clamped() {
        let h = HandControl::new(10.0);
        assert_eq!(h.distance(), HandControl::NEAREST);
        h.nudge(1.0e6);
        assert_eq!(h.distance(), HandControl::FARTHEST);
        h.set_distance(f64::NAN);
        assert_eq!(h.distance(), HandControl::FARTHEST);
    }

    #[test]
    fn wrist_tilt_stops_at_quarter_turn() {
        let w = WristControl::default();
        for _ in 0..100 {
            w.tilt(0.1);
        }
        assert!(approx_eq!(f64, w.pitch(), FRAC_PI_2, ulps = 2));
    }

    #[test]
    fn simulated_frame_measures_the_hand() {
        let cam = SimDepthCamera::new(HandControl::new(1200.0));
        let stats = DepthAverager::default().measure(&cam.render());
        assert_ge!(stats.valid_pixels, DepthPolicy::default().min_valid_pixels);
        assert!(approx_eq!(f64, stats.mean_mm.unwrap(), 1200.0, epsilon = 1e-6));
    }

    #[test]
    fn metre_frames_measure_the_same() {
        let mut cam = SimDepthCamera::new(HandControl::new(1200.0));
        cam.unit = DepthUnit::Meters;
        let stats = DepthAverager::default().measure(&cam.render());
        assert!(approx_eq!(f64, stats.mean_mm.unwrap(), 1200.0, epsilon = 1e-3));
    }

    #[test]
    fn absent_hand_is_insufficient() {
        let hand = HandControl::new(1200.0);
        hand.set_present(false);
        let cam = SimDepthCamera::new(hand);
        assert_eq!(DepthAverager::default().estimate(&cam.render()).volume(), None);
    }

    #[test]
    fn worker_publishes_volume() {
        let frames = vec![DepthFrame::filled(200, 120, DepthUnit::Millimeters, 600.0)];
        let worker = spawn_depth_worker(
            Box::new(ReplayDepth { frames, period: Duration::ZERO }),
            DepthAverager::default(),
        );
        let v = worker.take_volume_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(v, VolumeEstimate::FULL);
    }

    #[test]
    fn worker_skips_rejected_frames() {
        let frames = vec![
            DepthFrame::filled(200, 120, DepthUnit::Millimeters, 3600.0),
            // 5000 valid pixels: below the 20000 threshold.
            DepthFrame::filled(100, 50, DepthUnit::Millimeters, 600.0),
        ];
        let worker = spawn_depth_worker(
            Box::new(ReplayDepth { frames, period: Duration::from_millis(5) }),
            DepthAverager::default(),
        );
        // Wait for the source to finish and the worker to drain.
        let mut last = None;
        while !worker.is_finished() {
            if let Some(v) = worker.take_volume_timeout(Duration::from_millis(50)) {
                last = Some(v);
            }
        }
        assert_eq!(last, Some(VolumeEstimate::SILENT));
        assert_eq!(worker.diagnostics().rejected.load(Ordering::Relaxed), 1);
        assert_eq!(worker.diagnostics().valid_pixels.load(Ordering::Relaxed), 5000);
    }

    #[test]
    fn missing_camera_is_reported() {
        let worker = spawn_depth_worker(Box::new(NoDepthCamera), DepthAverager::default());
        assert_eq!(worker.take_volume_timeout(Duration::from_secs(2)), None);
        while !worker.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(worker.is_unavailable());
    }

    #[test]
    fn sim_wrist_reports_pitch() {
        let control = WristControl::default();
        control.set_pitch(0.4);
        let mut wrist = SimWrist::new(control);
        assert_eq!(wrist.read().unwrap().pitch, 0.4);
    }
}
