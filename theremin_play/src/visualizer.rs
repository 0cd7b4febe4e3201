//! Software-rendered visualizer using `minifb`.
//!
//! Layout (hand view):
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┬────────┐
//! │  FREQUENCY  [ 523 HZ ]          AMPLITUDE [ 0.42 ]   │  ┌──┐  │
//! │                                                      │  │▓▓│  │
//! │  wrist ──────────────●───────────────────────        │  │▓▓│  │ hand
//! │                                                      │  └──┘  │
//! │  ~~~~~~~~~~~~~~~~~~ scope trace ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~ │
//! │  status bar                                                   │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The technical view replaces the sliders with numeric diagnostics.

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::app::{AppState, ViewMode};
use crate::scope::{band_color, ScopeTrace};
use crate::sensors::{HandControl, SimControls, SimInput, SimKey};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:      usize = 900;
pub const WIN_H:      usize = 520;
pub const SCOPE_W:    usize = WIN_W - 40;
const SCOPE_X:        usize = 20;
const SCOPE_Y:        usize = 300;
const SCOPE_H:        usize = 140;
const SLIDER_X:       usize = 40;
const SLIDER_Y:       usize = 180;
const SLIDER_W:       usize = 640;
const VSLIDER_X:      usize = 780;
const VSLIDER_Y:      usize = 40;
const VSLIDER_H:      usize = 230;
const STATUS_Y:       usize = WIN_H - 50;
const TEXT_SCALE:     usize = 2;
const BG_COLOR:       u32   = 0xFF1A1A2E;
const PANEL_BG:       u32   = 0xFF16213E;
const TEXT_BG:        u32   = 0xFF0F3460;
const WRIST_COLOR:    u32   = 0xFFE94560;  // red hand
const HAND_COLOR:     u32   = 0xFF4D96FF;  // blue hand
const DIM_TEXT:       u32   = 0xFF888888;
const TEXT_COLOR:     u32   = 0xFFEEEEEE;

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    canvas: Canvas,
    sim_tx: Sender<SimInput>,
}

impl Visualizer {
    pub fn new(sim_tx: Sender<SimInput>) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            "Theremin",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            canvas: Canvas::new(WIN_W, WIN_H, BG_COLOR),
            sim_tx,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll keyboard inputs and translate to SimInput events.
    pub fn poll_input(&mut self) {
        if !self.window.is_open() {
            let _ = self.sim_tx.send(SimInput::Close);
            return;
        }

        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        let mut keys = Vec::new();
        if one_shot(Key::Q) || one_shot(Key::Escape) { keys.push(SimKey::Quit); }
        if one_shot(Key::Space) { keys.push(SimKey::PlayToggle); }
        if one_shot(Key::V)     { keys.push(SimKey::SwitchView); }
        if one_shot(Key::H)     { keys.push(SimKey::HandToggle); }
        if one_shot(Key::U)     { keys.push(SimKey::LinkToggle); }
        if one_shot(Key::L)     { keys.push(SimKey::Level); }
        if held(Key::W)         { keys.push(SimKey::HandNearer); }
        if held(Key::S)         { keys.push(SimKey::HandFarther); }
        if held(Key::Up)        { keys.push(SimKey::TiltUp); }
        if held(Key::Down)      { keys.push(SimKey::TiltDown); }

        for key in keys {
            let _ = self.sim_tx.send(SimInput::KeyDown(key));
        }
    }

    /// Render one frame.
    pub fn render(&mut self, app: &AppState, sim: &SimControls) {
        self.canvas.clear(BG_COLOR);

        match app.view() {
            ViewMode::Hand      => self.draw_hand_view(app),
            ViewMode::Technical => self.draw_technical_view(app, sim),
        }

        let freq  = app.sink().instrument().frequency;
        let color = band_color(band_position(app, freq));
        self.draw_scope(app.scope(), color);

        // ── Status bar ────────────────────────────────────────────────────
        self.canvas.rect(0, STATUS_Y, WIN_W, WIN_H - STATUS_Y, TEXT_BG);
        self.canvas.text(&app.status, 10, STATUS_Y + 8, TEXT_SCALE, TEXT_COLOR);
        let toggle = if app.is_playing() { "SPACE=STOP" } else { "SPACE=START" };
        self.canvas.text(
            &format!("{}  UP/DOWN=WRIST  W/S=HAND  H=HAND IN/OUT  L=LEVEL  U=LINK  V=VIEW  Q=QUIT", toggle),
            10, WIN_H - 16, 1, DIM_TEXT,
        );

        self.window.update_with_buffer(self.canvas.pixels(), WIN_W, WIN_H).ok();
    }

    // ── Hand view ─────────────────────────────────────────────────────────

    fn draw_hand_view(&mut self, app: &AppState) {
        let state = app.sink().instrument();

        // Read-out boxes
        self.canvas.rect(SLIDER_X, 40, 260, 60, PANEL_BG);
        self.canvas.outline(SLIDER_X, 40, 260, 60, WRIST_COLOR);
        self.canvas.text("FREQUENCY", SLIDER_X + 10, 48, TEXT_SCALE, DIM_TEXT);
        self.canvas.text(&format!("{:.0} HZ", state.frequency), SLIDER_X + 10, 70, 3, TEXT_COLOR);

        self.canvas.rect(SLIDER_X + 300, 40, 260, 60, PANEL_BG);
        self.canvas.outline(SLIDER_X + 300, 40, 260, 60, HAND_COLOR);
        self.canvas.text("AMPLITUDE", SLIDER_X + 310, 48, TEXT_SCALE, DIM_TEXT);
        self.canvas.text(&format!("{:.2}", state.amplitude), SLIDER_X + 310, 70, 3, TEXT_COLOR);

        // Wrist (frequency) slider
        let t = band_position(app, state.frequency);
        self.canvas.rect(SLIDER_X, SLIDER_Y, SLIDER_W, 6, PANEL_BG);
        let filled = (SLIDER_W as f32 * t) as usize;
        self.canvas.rect(SLIDER_X, SLIDER_Y, filled, 6, WRIST_COLOR);
        self.canvas.disc(SLIDER_X + filled, SLIDER_Y + 3, 10, WRIST_COLOR);
        let range = app.mapper().range();
        self.canvas.text(&format!("{:.0}", range.min_hz()), SLIDER_X, SLIDER_Y + 20, TEXT_SCALE, DIM_TEXT);
        self.canvas.text(
            &format!("{:.0}", range.max_hz()),
            SLIDER_X + SLIDER_W - 30, SLIDER_Y + 20, TEXT_SCALE, DIM_TEXT,
        );

        // Hand (amplitude) slider, bottom = silent
        self.canvas.rect(VSLIDER_X, VSLIDER_Y, 40, VSLIDER_H, PANEL_BG);
        let level = (VSLIDER_H as f32 * state.amplitude.clamp(0.0, 1.0)) as usize;
        self.canvas.rect(VSLIDER_X, VSLIDER_Y + VSLIDER_H - level, 40, level, HAND_COLOR);
        self.canvas.outline(VSLIDER_X, VSLIDER_Y, 40, VSLIDER_H, HAND_COLOR);
        self.canvas.text("HAND", VSLIDER_X, VSLIDER_Y + VSLIDER_H + 8, TEXT_SCALE, DIM_TEXT);

        if app.is_playing() {
            self.canvas.outline(SLIDER_X - 4, 36, SLIDER_W + 8, 68, 0xFFFFD700);
        }
    }

    // ── Technical view ────────────────────────────────────────────────────

    fn draw_technical_view(&mut self, app: &AppState, sim: &SimControls) {
        let state = app.sink().instrument();
        let d     = app.diagnostics();
        let opt   = |v: Option<f64>, fmt: &dyn Fn(f64) -> String| v.map(fmt).unwrap_or_else(|| "-".into());

        let lines = [
            format!("FREQUENCY     {:.1} HZ", state.frequency),
            format!("AMPLITUDE     {:.3}", state.amplitude),
            format!("PLAYING       {}", if state.playing { "YES" } else { "NO" }),
            format!("OUTPUT        {}", app.sink().output_name()),
            format!("WRIST VALUE   {}", opt(d.last_value, &|v| format!("{:+.3}", v))),
            format!("LATENCY       {}", opt(d.latency, &|v| format!("{:.1} MS", v * 1000.0))),
            format!("MESSAGES      {}", d.messages),
            format!("LINK          {}", link_label(d.link_up, sim)),
            format!("DEPTH FRAMES  {}  REJECTED {}", d.depth_frames, d.depth_rejected),
            format!("VALID PIXELS  {}", d.valid_pixels),
            format!("CAMERA        {}", if d.depth_missing { "UNAVAILABLE" } else { "OK" }),
            format!("SIM HAND      {}", hand_label(&sim.hand)),
            format!("SIM WRIST     {:+.3} RAD", sim.wrist.pitch()),
        ];

        self.canvas.rect(SCOPE_X, 20, SCOPE_W, SCOPE_Y - 40, PANEL_BG);
        for (i, line) in lines.iter().enumerate() {
            self.canvas.text(line, SCOPE_X + 12, 30 + i * 18, TEXT_SCALE, TEXT_COLOR);
        }
    }

    // ── Scope ─────────────────────────────────────────────────────────────

    fn draw_scope(&mut self, scope: &ScopeTrace, color: u32) {
        self.canvas.rect(SCOPE_X, SCOPE_Y, SCOPE_W, SCOPE_H, PANEL_BG);
        let mid  = (SCOPE_Y + SCOPE_H / 2) as isize;
        let half = (SCOPE_H / 2 - 4) as f32;

        // Centre line
        for x in SCOPE_X..SCOPE_X + SCOPE_W {
            self.canvas.put(x, mid as usize, 0xFF2A2A4E);
        }

        let mut prev: Option<isize> = None;
        for (i, &p) in scope.points.iter().enumerate().take(SCOPE_W) {
            let y = mid - (p * half) as isize;
            let (lo, hi) = match prev {
                Some(py) => (py.min(y), py.max(y)),
                None     => (y, y),
            };
            for yy in lo..=hi {
                if yy >= 0 {
                    self.canvas.put(SCOPE_X + i, yy as usize, color);
                }
            }
            prev = Some(y);
        }
        self.canvas.outline(SCOPE_X, SCOPE_Y, SCOPE_W, SCOPE_H, mix(color, BG_COLOR, 0.6));
    }
}

/// Where `hz` sits in the band, `0.0` at the bottom and `1.0` at the top.
fn band_position(app: &AppState, hz: f64) -> f32 {
    ((app.mapper().invert(hz) + 1.0) / 2.0) as f32
}

fn link_label(up: bool, sim: &SimControls) -> &'static str {
    match (&sim.link, up) {
        (_, false)                            => "DOWN",
        (Some(c), true) if !c.is_reachable()  => "SIM UNREACHABLE",
        (Some(_), true)                       => "SIM",
        (None, true)                          => "UDP",
    }
}

fn hand_label(hand: &HandControl) -> String {
    if hand.is_present() {
        format!("{:.0} MM", hand.distance())
    } else {
        "OUT OF VIEW".to_string()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas
// ════════════════════════════════════════════════════════════════════════════

/// An ARGB framebuffer with clipped drawing primitives.  Anything drawn
/// outside the buffer is silently dropped.
pub struct Canvas {
    width:  usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: usize, height: usize, color: u32) -> Self {
        Canvas { width, height, pixels: vec![color; width * height] }
    }

    pub fn pixels(&self) -> &[u32] { &self.pixels }

    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    pub fn clear(&mut self, color: u32) { self.pixels.fill(color); }

    pub fn put(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Filled rectangle.
    pub fn rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        let x_end = (x + w).min(self.width);
        for row in y..(y + h).min(self.height) {
            let start = row * self.width;
            if x < x_end {
                self.pixels[start + x..start + x_end].fill(color);
            }
        }
    }

    /// One-pixel rectangle outline.
    pub fn outline(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 {
            return;
        }
        self.rect(x, y, w, 1, color);
        self.rect(x, y + h - 1, w, 1, color);
        self.rect(x, y, 1, h, color);
        self.rect(x + w - 1, y, 1, h, color);
    }

    /// Filled disc of radius `r` centred on `(cx, cy)`.
    pub fn disc(&mut self, cx: usize, cy: usize, r: usize, color: u32) {
        let r = r as isize;
        for dy in -r..=r {
            // Half-width of this scanline.
            let half = ((r * r - dy * dy) as f64).sqrt() as isize;
            let y = cy as isize + dy;
            let x0 = (cx as isize - half).max(0);
            if y >= 0 {
                self.rect(x0 as usize, y as usize, (cx as isize + half - x0 + 1) as usize, 1, color);
            }
        }
    }

    /// Text in the 3×5 font, each font pixel a `scale`×`scale` block.
    /// Letters are drawn upper-case.
    pub fn text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let scale   = scale.max(1);
        let advance = 4 * scale;
        for (i, ch) in text.chars().enumerate() {
            let left = x + i * advance;
            if left + advance > self.width {
                break;
            }
            let bits = glyph(ch);
            for bit in 0..15 {
                if bits & (1 << (14 - bit)) != 0 {
                    let (col, row) = (bit % 3, bit / 3);
                    self.rect(left + col * scale, y + row * scale, scale, scale, color);
                }
            }
        }
    }
}

/// 3×5 glyph packed into 15 bits, top row first, leftmost column highest.
/// Unknown characters draw as a centred dot.
fn glyph(c: char) -> u16 {
    match c.to_ascii_uppercase() {
        '0' => 0x7B6F, '1' => 0x2C97, '2' => 0x73E7, '3' => 0x73CF, '4' => 0x5BC9,
        '5' => 0x79CF, '6' => 0x79EF, '7' => 0x7249, '8' => 0x7BEF, '9' => 0x7BCF,
        'A' => 0x7BED, 'B' => 0x6BAE, 'C' => 0x7927, 'D' => 0x6B6E, 'E' => 0x79E7,
        'F' => 0x79E4, 'G' => 0x796F, 'H' => 0x5BED, 'I' => 0x7497, 'J' => 0x126F,
        'K' => 0x5BAD, 'L' => 0x4927, 'M' => 0x5F6D, 'N' => 0x7B6D, 'O' => 0x7B6F,
        'P' => 0x7BE4, 'Q' => 0x7B79, 'R' => 0x6BAD, 'S' => 0x79CF, 'T' => 0x7492,
        'U' => 0x5B6F, 'V' => 0x5B52, 'W' => 0x5B7D, 'X' => 0x5AAD, 'Y' => 0x5BD2,
        'Z' => 0x72A7,
        '/' => 0x12A4, '-' => 0x01C0, '.' => 0x0002, ',' => 0x0014, ':' => 0x0410,
        '=' => 0x0E38, '+' => 0x05D0, '(' => 0x2922, ')' => 0x224A, ' ' => 0x0000,
        _   => 0x0080,
    }
}

/// Linear mix of two ARGB colours; `t = 0` gives `a`, `t = 1` gives `b`.
/// The result is opaque.
fn mix(a: u32, b: u32, t: f32) -> u32 {
    let t = t.clamp(0.0, 1.0);
    [16u32, 8, 0].iter().fold(0xFF00_0000, |acc, &shift| {
        let ca = ((a >> shift) & 0xFF) as f32;
        let cb = ((b >> shift) & 0xFF) as f32;
        acc | (((ca + (cb - ca) * t).round() as u32) << shift)
    })
}
