//! Error types for the performing side.

use std::io;
use std::path::PathBuf;

use theremin_map::MapError;
use thiserror::Error;

/// Failure to open a tone backend.  Never fatal: the caller falls back to a
/// silent output.
#[derive(Debug, Error)]
pub enum ToneError {
    #[error("no default audio output device")]
    NoDevice,

    #[error("audio device configuration: {0}")]
    Config(String),

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),

    #[error("audio stream: {0}")]
    Stream(String),

    #[error("MIDI: {0}")]
    Midi(String),

    #[error("no MIDI output ports")]
    NoMidiPort,
}

/// The depth camera cannot deliver frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("depth camera unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid `{field}`: {source}")]
    Invalid {
        field:  &'static str,
        #[source]
        source: MapError,
    },

    #[error("invalid `{field}`: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}
