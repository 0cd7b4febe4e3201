//! # theremin_play
//!
//! The performing side of a two-device theremin.  Wrist pitch arrives over
//! [`wrist_link`] and sets the frequency; hand distance from a depth camera
//! sets the volume; one continuous sine tone plays through `cpal` (or a
//! MIDI synth, or nothing).
//!
//! ## Data flow
//!
//! ```text
//! wrist ─ ControlMessage ─▶ Listener ─▶ ParameterMapper ─┐
//!                                                        ├─▶ OscillatorSink ─▶ audio
//! depth camera ─ DepthFrame ─▶ VolumeTracker ────────────┘
//! ```
//!
//! The two paths never touch each other's parameter: messages change only
//! frequency, depth frames change only amplitude.
//!
//! ## Simulation keys
//!
//! Without hardware the wrist and the camera are simulated and driven from
//! the visualizer window.
//!
//! | Key | Action |
//! |---|---|
//! | `Up` / `Down` (hold) | Tilt the wrist: pitch up / down |
//! | `L` | Level the wrist (band midpoint) |
//! | `W` / `S` (hold) | Move the hand nearer / farther: louder / quieter |
//! | `H` | Take the hand out of view / put it back |
//! | `U` | Make the simulated peer unreachable / reachable |
//! | `Space` | Start / stop the tone |
//! | `V` | Switch hand view / technical view |
//! | `Q` / `Escape` | Quit |

pub mod app;
pub mod config;
pub mod error;
pub mod oscillator;
pub mod scope;
pub mod sensors;
pub mod visualizer;
