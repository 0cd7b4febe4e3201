//! # theremin_map
//!
//! The sensor-to-performance pipeline of a two-device theremin: a wrist
//! supplies pitch, a depth camera supplies hand distance, and one sine
//! oscillator plays the result.
//!
//! ```text
//!  wrist attitude ──► MotionSampler ──► (transport) ──► ParameterMapper ──┐
//!                                                                         ├─► ToneParams ─► SineVoice
//!  depth frames ─────► DepthAverager ─► VolumeTracker ────────────────────┘
//! ```
//!
//! The two paths share nothing but the oscillator's two independent
//! scalars.  Values cross thread boundaries through one-slot
//! [`slot::latest`] channels, so a slow consumer only ever sees the newest
//! value.
//!
//! ## Quick start
//!
//! ```rust
//! use theremin_map::{DepthAverager, DepthFrame, DepthUnit, ParameterMapper};
//!
//! let mapper = ParameterMapper::default();          // 250 – 1050 Hz
//! assert_eq!(mapper.map(1.0), 1050.0);
//!
//! let frame  = DepthFrame::filled(160, 128, DepthUnit::Millimeters, 600.0);
//! let volume = DepthAverager::default().estimate(&frame).volume().unwrap();
//! assert_eq!(volume.value(), 1.0);
//! ```

pub mod depth;
pub mod error;
pub mod mapper;
pub mod motion;
pub mod slot;
pub mod tone;

pub use depth::{
    DepthAverager, DepthFrame, DepthPolicy, DepthReading, DepthStats, DepthUnit,
    VolumeEstimate, VolumeTracker,
};
pub use error::{MapError, MotionError};
pub use mapper::{clamp_unit, FrequencyRange, InputScale, ParameterMapper};
pub use motion::{
    epoch_seconds, Attitude, AttitudeSample, AttitudeSensor, MotionSampler, NoSensor,
    SweepSensor, DEFAULT_INTERVAL,
};
pub use slot::{latest, Publisher, Subscriber};
pub use tone::{InstrumentState, SineVoice, ToneParams};
