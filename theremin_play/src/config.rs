//! Application configuration.
//!
//! Defaults come from [`AppConfig::default`], an optional JSON file
//! overrides them (kebab-case keys; missing keys keep their defaults), and
//! command-line flags override the file.
//!
//! ```json
//! {
//!   "min-frequency": 250.0,
//!   "max-frequency": 1050.0,
//!   "input-scale": "quarter-turn",
//!   "depth": { "min-valid-pixels": 12000 },
//!   "output": "midi",
//!   "link": "udp",
//!   "bind": "0.0.0.0:47800"
//! }
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use theremin_map::{DepthAverager, DepthPolicy, DepthUnit, FrequencyRange, InputScale, ParameterMapper};
use wrist_link::DEFAULT_PORT;

use crate::error::ConfigError;

// ════════════════════════════════════════════════════════════════════════════
// Choices
// ════════════════════════════════════════════════════════════════════════════

/// Where the tone goes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ToneOutputKind {
    /// Sine oscillator on the default audio device.
    #[default]
    Audio,
    /// Nearest note + pitch bend on the first MIDI port.
    Midi,
    /// Silent; state is still tracked.
    Null,
}

/// Where wrist messages come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// A simulated wrist in this process, driven from the keyboard.
    #[default]
    Loopback,
    /// A real wrist over UDP.
    Udp,
}

/// Where depth frames come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DepthMode {
    /// A simulated camera whose hand distance is set from the keyboard.
    #[default]
    Simulated,
    /// No camera: amplitude stays at its initial value.
    None,
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppConfig {
    pub min_frequency:     f64,
    pub max_frequency:     f64,
    pub input_scale:       InputScale,
    pub depth:             DepthPolicy,
    pub depth_unit:        DepthUnit,
    pub depth_mode:        DepthMode,
    pub initial_amplitude: f32,
    pub initial_frequency: f64,
    pub output:            ToneOutputKind,
    pub link:              LinkMode,
    /// Listening address in [`LinkMode::Udp`].
    pub bind:              SocketAddr,
    /// Start playing when the first control message arrives.
    pub auto_start:        bool,
    /// Sampling interval of the simulated wrist, milliseconds.
    pub wrist_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            min_frequency:     250.0,
            max_frequency:     1050.0,
            input_scale:       InputScale::default(),
            depth:             DepthPolicy::default(),
            depth_unit:        DepthUnit::Millimeters,
            depth_mode:        DepthMode::default(),
            initial_amplitude: 0.1,
            initial_frequency: 250.0,
            output:            ToneOutputKind::default(),
            link:              LinkMode::default(),
            bind:              SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            auto_start:        true,
            wrist_interval_ms: 100,
        }
    }
}

impl AppConfig {
    /// Read a JSON file on top of the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Defaults, then the file named by `args`, then the flags.  Validated.
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut cfg = match &args.config {
            Some(path) => Self::from_file(path)?,
            None       => Self::default(),
        };
        args.apply_to(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn range(&self) -> Result<FrequencyRange, ConfigError> {
        FrequencyRange::new(self.min_frequency, self.max_frequency)
            .map_err(|source| ConfigError::Invalid { field: "min-frequency/max-frequency", source })
    }

    pub fn mapper(&self) -> Result<ParameterMapper, ConfigError> {
        Ok(ParameterMapper::new(self.range()?, self.input_scale))
    }

    pub fn averager(&self) -> Result<DepthAverager, ConfigError> {
        DepthAverager::new(self.depth)
            .map_err(|source| ConfigError::Invalid { field: "depth", source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.range()?;
        self.averager()?;
        if !(0.0..=1.0).contains(&self.initial_amplitude) {
            return Err(ConfigError::OutOfRange {
                field:  "initial-amplitude",
                reason: format!("{} is outside 0..=1", self.initial_amplitude),
            });
        }
        if !range.contains(self.initial_frequency) {
            return Err(ConfigError::OutOfRange {
                field:  "initial-frequency",
                reason: format!(
                    "{} Hz is outside {}..={} Hz",
                    self.initial_frequency, range.min_hz(), range.max_hz()
                ),
            });
        }
        if self.wrist_interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field:  "wrist-interval-ms",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CliArgs
// ════════════════════════════════════════════════════════════════════════════

/// Play a theremin: wrist pitch sets frequency, hand distance sets volume.
#[derive(Parser, Debug, Default)]
#[clap(author, about, long_about = None)]
pub struct CliArgs {
    /// JSON configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Bottom of the frequency band, Hz
    #[clap(long)]
    pub min_frequency: Option<f64>,

    /// Top of the frequency band, Hz
    #[clap(long)]
    pub max_frequency: Option<f64>,

    /// Treat ±90° of wrist tilt as the full band (default: ±1 rad)
    #[clap(long)]
    pub quarter_turn: bool,

    #[clap(long, value_enum)]
    pub output: Option<ToneOutputKind>,

    #[clap(long, value_enum)]
    pub link: Option<LinkMode>,

    #[clap(long, value_enum)]
    pub depth: Option<DepthMode>,

    /// UDP listening address
    #[clap(long)]
    pub bind: Option<SocketAddr>,

    /// Minimum valid pixels for a depth frame to count
    #[clap(long)]
    pub min_valid_pixels: Option<usize>,

    /// Wait for Space instead of starting on the first message
    #[clap(long)]
    pub no_auto_start: bool,

    /// Start with this amplitude, 0..=1
    #[clap(long)]
    pub amplitude: Option<f32>,
}

impl CliArgs {
    fn apply_to(&self, cfg: &mut AppConfig) {
        if let Some(v) = self.min_frequency    { cfg.min_frequency = v; }
        if let Some(v) = self.max_frequency    { cfg.max_frequency = v; }
        if self.quarter_turn                   { cfg.input_scale = InputScale::QuarterTurn; }
        if let Some(v) = self.output           { cfg.output = v; }
        if let Some(v) = self.link             { cfg.link = v; }
        if let Some(v) = self.depth            { cfg.depth_mode = v; }
        if let Some(v) = self.bind             { cfg.bind = v; }
        if let Some(v) = self.min_valid_pixels { cfg.depth.min_valid_pixels = v; }
        if self.no_auto_start                  { cfg.auto_start = false; }
        if let Some(v) = self.amplitude        { cfg.initial_amplitude = v; }

        // A moved band drags the start frequency with it.  A bad band is
        // left for `validate` to report.
        if FrequencyRange::new(cfg.min_frequency, cfg.max_frequency).is_ok() {
            cfg.initial_frequency = cfg.initial_frequency.clamp(cfg.min_frequency, cfg.max_frequency);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
