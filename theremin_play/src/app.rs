//! Top-level application state machine.
//!
//! `AppState` owns the [`ParameterMapper`], the [`OscillatorSink`] and the
//! two input paths.  Each frame, [`tick`](AppState::tick) applies the newest
//! control message (frequency path) and the newest volume estimate
//! (amplitude path); the paths share nothing but the sink.

use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use theremin_map::{epoch_seconds, ParameterMapper, ToneParams, VolumeEstimate};
use wrist_link::{loopback, ControlMessage, Listener, UdpSession};

use crate::config::{AppConfig, DepthMode, LinkMode};
use crate::oscillator::{open_tone_output, OscillatorSink, PlayState};
use crate::scope::ScopeTrace;
use crate::sensors::{
    spawn_depth_worker, spawn_sim_wrist, DepthSource, DepthWorker, NoDepthCamera, SimControls,
    SimDepthCamera, SimInput, SimKey, WristThread,
};
use crate::visualizer::{Visualizer, SCOPE_W};

// ════════════════════════════════════════════════════════════════════════════
// Events and views
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Start,
    Stop,
    Toggle,
    SwitchView,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Hand sliders and two read-out boxes.
    Hand,
    /// Numbers and diagnostics.
    Technical,
}

/// What the technical view shows besides the instrument itself.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Diagnostics {
    /// Raw value of the last control message.
    pub last_value:     Option<f64>,
    /// Seconds between capture and arrival of the last message.
    pub latency:        Option<f64>,
    pub messages:       u64,
    pub depth_frames:   u64,
    pub depth_rejected: u64,
    pub valid_pixels:   usize,
    pub depth_missing:  bool,
    pub link_up:        bool,
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    mapper:     ParameterMapper,
    sink:       OscillatorSink,
    /// The next control message starts the tone.  Cleared by the first
    /// start, and by any explicit play-state event.
    armed:      bool,

    // ── inputs ────────────────────────────────────────────────────────────
    link:  Option<Listener>,
    depth: Option<DepthWorker>,

    // ── display ───────────────────────────────────────────────────────────
    view:   ViewMode,
    scope:  ScopeTrace,
    diag:   Diagnostics,
    pub status: String,
}

impl AppState {
    pub fn new(
        cfg:   &AppConfig,
        sink:  OscillatorSink,
        link:  Option<Listener>,
        depth: Option<DepthWorker>,
    ) -> Result<Self, crate::error::ConfigError> {
        let diag = Diagnostics { link_up: link.is_some(), ..Diagnostics::default() };
        Ok(AppState {
            mapper:     cfg.mapper()?,
            sink,
            armed:      cfg.auto_start,
            link,
            depth,
            view:       ViewMode::Hand,
            scope:      ScopeTrace::new(SCOPE_W),
            diag,
            status:     "Ready. Tilt the wrist for pitch, move the hand for volume.".to_string(),
        })
    }

    // ── process one ControlEvent ─────────────────────────────────────────

    /// Returns `false` when the application should quit.
    pub fn handle_event(&mut self, event: ControlEvent) -> bool {
        if matches!(event, ControlEvent::Start | ControlEvent::Stop | ControlEvent::Toggle) {
            self.armed = false;
        }
        match event {
            ControlEvent::Start => {
                if self.sink.start() {
                    self.status = "START: tone playing".to_string();
                }
            }
            ControlEvent::Stop => {
                if self.sink.stop() {
                    self.status = "STOP: tone silent".to_string();
                }
            }
            ControlEvent::Toggle => {
                self.status = match self.sink.toggle() {
                    PlayState::Playing => "START: tone playing".to_string(),
                    PlayState::Stopped => "STOP: tone silent".to_string(),
                };
            }
            ControlEvent::SwitchView => {
                self.view = match self.view {
                    ViewMode::Hand      => ViewMode::Technical,
                    ViewMode::Technical => ViewMode::Hand,
                };
            }
            ControlEvent::Quit => return false,
        }
        true
    }

    /// Frequency path: one transported value into the sink.
    pub fn apply_control(&mut self, message: ControlMessage) -> f64 {
        let hz = self.sink.set_frequency(self.mapper.map_raw(message.value));
        self.diag.last_value = Some(message.value);
        self.diag.messages  += 1;
        self.diag.latency    = message.latency(epoch_seconds());
        if let Some(l) = self.diag.latency {
            log::debug!("[link] latency {:.1} ms", l * 1000.0);
        }
        if self.armed {
            self.armed = false;
            if self.sink.start() {
                self.status = "Wrist connected: playing".to_string();
            }
        }
        hz
    }

    /// Amplitude path: one accepted depth estimate into the sink.
    pub fn apply_volume(&mut self, volume: VolumeEstimate) -> f32 {
        self.sink.set_amplitude(volume.value())
    }

    // ── Per-frame tick ────────────────────────────────────────────────────

    pub fn tick(&mut self) {
        if let Some(msg) = self.link.as_ref().and_then(Listener::take) {
            self.apply_control(msg);
        }
        if let Some(v) = self.depth.as_ref().and_then(DepthWorker::take_volume) {
            self.apply_volume(v);
        }
        if let Some(depth) = &self.depth {
            let d = depth.diagnostics();
            self.diag.depth_frames   = d.frames.load(Ordering::Relaxed);
            self.diag.depth_rejected = d.rejected.load(Ordering::Relaxed);
            self.diag.valid_pixels   = d.valid_pixels.load(Ordering::Relaxed);
            self.diag.depth_missing  = depth.is_unavailable();
        }
        self.scope.tick(&self.sink.instrument());
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn sink(&self)        -> &OscillatorSink  { &self.sink }
    pub fn mapper(&self)      -> &ParameterMapper { &self.mapper }
    pub fn view(&self)        -> ViewMode         { self.view }
    pub fn scope(&self)       -> &ScopeTrace      { &self.scope }
    pub fn diagnostics(&self) -> &Diagnostics     { &self.diag }
    pub fn is_playing(&self)  -> bool             { self.sink.state() == PlayState::Playing }

    pub fn listener(&self) -> Option<&Listener> { self.link.as_ref() }
}

/// Keyboard input → simulation controls, plus the event it stands for.
pub fn translate(input: SimInput, sim: &SimControls) -> Option<ControlEvent> {
    const HAND_STEP: f64 = 100.0;
    const TILT_STEP: f64 = 0.05;

    match input {
        SimInput::Close => Some(ControlEvent::Quit),
        SimInput::KeyDown(key) => match key {
            SimKey::HandNearer  => { sim.hand.nudge(-HAND_STEP); None }
            SimKey::HandFarther => { sim.hand.nudge(HAND_STEP);  None }
            SimKey::HandToggle  => { sim.hand.set_present(!sim.hand.is_present()); None }
            SimKey::TiltUp      => { sim.wrist.tilt(TILT_STEP);  None }
            SimKey::TiltDown    => { sim.wrist.tilt(-TILT_STEP); None }
            SimKey::Level       => { sim.wrist.set_pitch(0.0);   None }
            SimKey::LinkToggle  => {
                if let Some(link) = &sim.link {
                    let up = !link.is_reachable();
                    link.set_reachable(up);
                    log::info!("[link] simulated peer {}", if up { "reachable" } else { "unreachable" });
                }
                None
            }
            SimKey::PlayToggle  => Some(ControlEvent::Toggle),
            SimKey::SwitchView  => Some(ControlEvent::SwitchView),
            SimKey::Quit        => Some(ControlEvent::Quit),
        },
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Input threads kept alive for the length of the run.
struct Inputs {
    listener: Option<Listener>,
    depth:    Option<DepthWorker>,
    _wrist:   Option<WristThread>,
    sim:      SimControls,
}

fn start_inputs(cfg: &AppConfig) -> anyhow::Result<Inputs> {
    let mut sim = SimControls::default();

    let (listener, wrist) = match cfg.link {
        LinkMode::Loopback => {
            let (tx, rx, control) = loopback::pair();
            let listener = Listener::spawn(rx)?;
            let wrist = spawn_sim_wrist(
                sim.wrist.clone(),
                tx,
                Duration::from_millis(cfg.wrist_interval_ms),
            )?;
            sim.link = Some(control);
            (Some(listener), Some(wrist))
        }
        LinkMode::Udp => {
            // A wrist that never connects is a degraded mode, not a failure.
            let listener = match Listener::spawn(UdpSession::receiver(cfg.bind)) {
                Ok(l) => {
                    log::info!("[link] listening on {}", cfg.bind);
                    Some(l)
                }
                Err(e) => {
                    log::warn!("[link] {}; frequency holds its last value", e);
                    None
                }
            };
            (listener, None)
        }
    };

    let source: Box<dyn DepthSource> = match cfg.depth_mode {
        DepthMode::Simulated => {
            let mut cam = SimDepthCamera::new(sim.hand.clone());
            cam.unit = cfg.depth_unit;
            Box::new(cam)
        }
        DepthMode::None => Box::new(NoDepthCamera),
    };
    let depth = spawn_depth_worker(source, cfg.averager()?);

    Ok(Inputs { listener, depth: Some(depth), _wrist: wrist, sim })
}

/// Run the full application.
///
/// Creates the tone output, the input threads and the visualizer, then
/// drives the event/render loop at ~60 fps until the window closes.
pub fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let range  = cfg.range()?;
    let params = Arc::new(ToneParams::new(cfg.initial_frequency, cfg.initial_amplitude));
    let output = open_tone_output(cfg.output, &params);
    let sink   = OscillatorSink::new(
        range, cfg.initial_frequency, cfg.initial_amplitude, params, output,
    );

    let inputs = start_inputs(&cfg)?;
    let sim    = inputs.sim.clone();

    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let mut vis = Visualizer::new(sim_tx)?;

    let mut app = AppState::new(&cfg, sink, inputs.listener, inputs.depth)?;
    let _wrist  = inputs._wrist;
    log::info!("[tone] output: {}", app.sink().output_name());

    while vis.is_open() {
        vis.poll_input();
        if !drain_inputs(&mut app, &sim_rx, &sim) {
            break;
        }
        app.tick();
        vis.render(&app, &sim);
    }

    app.handle_event(ControlEvent::Stop);
    Ok(())
}

/// Apply every pending window input.  `false` means quit.
fn drain_inputs(app: &mut AppState, rx: &Receiver<SimInput>, sim: &SimControls) -> bool {
    loop {
        match rx.try_recv() {
            Ok(input) => {
                if let Some(event) = translate(input, sim) {
                    if !app.handle_event(event) {
                        return false;
                    }
                }
            }
            Err(TryRecvError::Empty)        => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
