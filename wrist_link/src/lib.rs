//! # wrist_link
//!
//! Carries the wrist's pitch from the sensing device to the instrument.
//!
//! Delivery is best-effort and latest-value-wins: a [`Link`] drops what it
//! cannot send and logs the condition once; a [`Listener`] hands the
//! consumer only the newest control message.  Transports plug in through
//! the [`Session`] trait: [`UdpSession`] for two processes,
//! [`loopback::pair`] for one.
//!
//! ```rust
//! use std::time::Duration;
//! use wrist_link::{loopback, Link, Listener};
//!
//! let (tx, rx, _) = loopback::pair();
//! let listener = Listener::spawn(rx).unwrap();
//! let mut link = Link::new(tx);
//! link.activate().unwrap();
//! assert!(link.send_value(1.0).is_sent());
//!
//! let msg = listener.take_timeout(Duration::from_secs(1)).unwrap();
//! assert_eq!(msg.value, 1.0);
//! ```

pub mod error;
pub mod loopback;
pub mod message;
pub mod recording;
pub mod session;
pub mod udp;

pub use error::LinkError;
pub use loopback::{LoopbackControl, LoopbackSession};
pub use message::{ControlMessage, Greeting, Payload};
pub use recording::{Recorder, RecordingState};
pub use session::{
    DropReason, Link, Listener, ListenerStats, SendOutcome, Session, SessionState,
};
pub use udp::{UdpSession, UNREACHABLE_BACKOFF};

/// Default UDP port the instrument listens on.
pub const DEFAULT_PORT: u16 = 47800;
