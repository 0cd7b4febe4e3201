//! In-process session pair.
//!
//! Two [`LoopbackSession`]s joined by channels.  Reachability is a shared
//! switch so tests and the keyboard simulation can take the peer away and
//! bring it back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::error::LinkError;
use crate::session::{Session, SessionState};

/// Shared control over a loopback pair.
#[derive(Clone, Debug)]
pub struct LoopbackControl {
    reachable: Arc<AtomicBool>,
}

impl LoopbackControl {
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Relaxed);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }
}

pub struct LoopbackSession {
    tx:        Sender<Vec<u8>>,
    rx:        Receiver<Vec<u8>>,
    control:   LoopbackControl,
    state:     SessionState,
    refuse:    bool,
}

impl LoopbackSession {
    /// Make this end fail activation with [`SessionState::Inactive`].
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn control(&self) -> LoopbackControl {
        self.control.clone()
    }
}

/// Two connected ends plus the switch that governs them.
pub fn pair() -> (LoopbackSession, LoopbackSession, LoopbackControl) {
    let control = LoopbackControl { reachable: Arc::new(AtomicBool::new(true)) };
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    let end = |tx, rx| LoopbackSession {
        tx,
        rx,
        control: control.clone(),
        state:   SessionState::NotActivated,
        refuse:  false,
    };
    let a = end(a_tx, a_rx);
    let b = end(b_tx, b_rx);
    (a, b, control)
}

impl Session for LoopbackSession {
    fn activate(&mut self) -> Result<SessionState, LinkError> {
        self.state = if self.refuse { SessionState::Inactive } else { SessionState::Activated };
        Ok(self.state)
    }

    fn state(&self) -> SessionState { self.state }

    fn is_reachable(&self) -> bool {
        self.state == SessionState::Activated && self.control.is_reachable()
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if !self.is_reachable() {
            return Err(LinkError::Unreachable);
        }
        self.tx.send(bytes.to_vec()).map_err(|_| LinkError::Unreachable)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError> {
        match self.rx.recv_timeout(timeout) {
            Ok(bytes)                            => Ok(Some(bytes)),
            Err(RecvTimeoutError::Timeout)       => Ok(None),
            Err(RecvTimeoutError::Disconnected)  => Err(LinkError::Closed),
        }
    }
}
