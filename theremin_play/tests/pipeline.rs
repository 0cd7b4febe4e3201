//! The instrument end to end: a wrist link and a depth source feeding one
//! silent oscillator.

use std::time::{Duration, Instant};

use float_cmp::approx_eq;
use theremin_map::{DepthFrame, DepthUnit};
use theremin_play::app::AppState;
use theremin_play::config::AppConfig;
use theremin_play::oscillator::OscillatorSink;
use theremin_play::sensors::{spawn_depth_worker, NoDepthCamera, ReplayDepth};
use wrist_link::{loopback, DropReason, Link, Listener, SendOutcome};

const WAIT: Duration = Duration::from_secs(3);

fn app(cfg: &AppConfig, link: Option<Listener>, frames: Vec<DepthFrame>) -> AppState {
    let sink = OscillatorSink::silent(
        cfg.range().unwrap(),
        cfg.initial_frequency,
        cfg.initial_amplitude,
    );
    let depth = spawn_depth_worker(
        Box::new(ReplayDepth { frames, period: Duration::from_millis(5) }),
        cfg.averager().unwrap(),
    );
    AppState::new(cfg, sink, link, Some(depth)).unwrap()
}

/// Tick until `done` holds or the deadline passes.
fn tick_until(app: &mut AppState, done: impl Fn(&AppState) -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        app.tick();
        if done(app) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn frame(mm: f32) -> DepthFrame {
    DepthFrame::filled(320, 240, DepthUnit::Millimeters, mm)
}

#[test]
fn wrist_sets_pitch_and_hand_sets_volume() {
    let cfg = AppConfig::default();
    let (tx, rx, _) = loopback::pair();
    let listener = Listener::spawn(rx).unwrap();
    let mut link = Link::new(tx);
    link.activate().unwrap();

    let mut app = app(&cfg, Some(listener), vec![frame(600.0)]);
    assert!(link.send_value(1.0).is_sent());

    assert!(tick_until(&mut app, |a| {
        let s = a.sink().instrument();
        s.frequency == 1050.0 && s.amplitude == 1.0
    }));
    assert!(app.is_playing());
    assert_eq!(app.diagnostics().messages, 1);
}

#[test]
fn far_hand_silences_and_sparse_frame_holds() {
    let cfg = AppConfig::default();
    let mut sparse = DepthFrame::filled(320, 240, DepthUnit::Millimeters, 0.0);
    for i in 0..5000 {
        if let Some(p) = sparse.pixel_mut(i % 320, i / 320) {
            *p = 600.0;
        }
    }

    let mut app = app(&cfg, None, vec![frame(3600.0), sparse]);
    // The rejection is counted after the frame is measured.
    assert!(tick_until(&mut app, |a| a.diagnostics().depth_rejected == 1));
    app.tick();

    let s = app.sink().instrument();
    assert_eq!(s.amplitude, 0.0);
    assert_eq!(s.frequency, 250.0);
    assert_eq!(app.diagnostics().depth_frames, 2);
    assert_eq!(app.diagnostics().valid_pixels, 5000);
}

#[test]
fn metre_frames_use_the_same_policy() {
    let cfg = AppConfig::default();
    let mut app = app(&cfg, None, vec![DepthFrame::filled(320, 240, DepthUnit::Meters, 2.1)]);
    // 2100 mm is halfway between 600 and 3600.
    assert!(tick_until(&mut app, |a| {
        approx_eq!(f32, a.sink().instrument().amplitude, 0.5, epsilon = 1e-4)
    }));
}

#[test]
fn unreachable_wrist_leaves_the_instrument_alone() {
    let cfg = AppConfig::default();
    let (tx, rx, control) = loopback::pair();
    let listener = Listener::spawn(rx).unwrap();
    let mut link = Link::new(tx);
    link.activate().unwrap();
    control.set_reachable(false);

    let mut app = app(&cfg, Some(listener), Vec::new());
    assert_eq!(link.send_value(1.0), SendOutcome::Dropped(DropReason::Unreachable));

    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        app.tick();
        std::thread::sleep(Duration::from_millis(10));
    }
    let s = app.sink().instrument();
    assert_eq!(s.frequency, 250.0);
    assert!(!s.playing);
    assert_eq!(app.diagnostics().messages, 0);
}

#[test]
fn missing_camera_keeps_initial_volume() {
    let cfg = AppConfig::default();
    let sink = OscillatorSink::silent(cfg.range().unwrap(), 250.0, 0.1);
    let depth = spawn_depth_worker(Box::new(NoDepthCamera), cfg.averager().unwrap());
    let mut app = AppState::new(&cfg, sink, None, Some(depth)).unwrap();

    assert!(tick_until(&mut app, |a| a.diagnostics().depth_missing));
    assert_eq!(app.sink().instrument().amplitude, 0.1);
}
