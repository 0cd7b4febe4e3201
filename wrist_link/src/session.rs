//! Sessions, the sending [`Link`], and the receiving [`Listener`].
//!
//! A [`Session`] is one end of a bidirectional datagram channel whose
//! delivery guarantees belong to the platform (UDP, an in-process loopback,
//! ...).  On top of it:
//!
//! * [`Link`] sends best-effort: a send while the session is not activated
//!   or the peer is unreachable is dropped, reported once, and never
//!   retried.
//! * [`Listener`] runs a receive loop on its own thread and publishes each
//!   control message into a one-slot [`theremin_map::slot`] channel, so the
//!   consumer only ever sees the newest one.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use theremin_map::{latest, Subscriber};

use crate::error::LinkError;
use crate::message::{ControlMessage, Payload};

// ════════════════════════════════════════════════════════════════════════════
// Session
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotActivated,
    Inactive,
    Activated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::NotActivated => "not activated",
            SessionState::Inactive     => "inactive",
            SessionState::Activated    => "activated",
        };
        f.write_str(s)
    }
}

/// One end of a platform message channel.
pub trait Session: Send {
    /// Bring the session up.  Returns the resulting state; an `Err` means the
    /// endpoint could not be created at all.
    fn activate(&mut self) -> Result<SessionState, LinkError>;

    fn state(&self) -> SessionState;

    /// Whether a send right now has any chance of arriving.
    fn is_reachable(&self) -> bool;

    /// Hand one encoded payload to the platform.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Wait up to `timeout` for one inbound payload.
    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError>;
}

impl Session for Box<dyn Session> {
    fn activate(&mut self) -> Result<SessionState, LinkError> { (**self).activate() }
    fn state(&self) -> SessionState                            { (**self).state() }
    fn is_reachable(&self) -> bool                             { (**self).is_reachable() }
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), LinkError> { (**self).transmit(bytes) }
    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError> {
        (**self).receive(timeout)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SendOutcome / DropReason
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    NotActivated,
    Unreachable,
    /// NaN or infinite value; JSON cannot carry it.
    NonFinite,
    /// The platform refused the payload.
    Failed,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::NotActivated => "session is not activated",
            DropReason::Unreachable  => "peer is not reachable",
            DropReason::NonFinite    => "value is not finite",
            DropReason::Failed       => "send failed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Dropped(DropReason),
}

impl SendOutcome {
    pub fn is_sent(self) -> bool { self == SendOutcome::Sent }
}

// ════════════════════════════════════════════════════════════════════════════
// DropReporter: log each drop condition once
// ════════════════════════════════════════════════════════════════════════════

/// Logs the first drop of a run of identical drops, and the recovery.
#[derive(Debug, Default)]
struct DropReporter {
    current: Option<DropReason>,
    reports: u64,
}

impl DropReporter {
    fn dropped(&mut self, reason: DropReason) {
        if self.current != Some(reason) {
            log::warn!("[link] dropping sends: {}", reason);
            self.current = Some(reason);
            self.reports += 1;
        }
    }

    fn delivered(&mut self) {
        if let Some(reason) = self.current.take() {
            log::info!("[link] sending again (was: {})", reason);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Link: the sending side
// ════════════════════════════════════════════════════════════════════════════

pub struct Link<S: Session> {
    session:  S,
    reporter: DropReporter,
    sent:     u64,
    dropped:  u64,
}

impl<S: Session> Link<S> {
    pub fn new(session: S) -> Self {
        Link { session, reporter: DropReporter::default(), sent: 0, dropped: 0 }
    }

    /// Activate the underlying session.  A non-activated result is logged but
    /// is not an error: later sends are simply dropped.
    pub fn activate(&mut self) -> Result<SessionState, LinkError> {
        let state = self.session.activate()?;
        if state == SessionState::Activated {
            log::info!("[link] session activated");
        } else {
            log::warn!("[link] session activation failed: {}", state);
        }
        Ok(state)
    }

    pub fn send(&mut self, payload: &Payload) -> SendOutcome {
        if let Payload::Control(m) = payload {
            if !m.value.is_finite() {
                return self.drop_with(DropReason::NonFinite);
            }
        }
        if self.session.state() != SessionState::Activated {
            return self.drop_with(DropReason::NotActivated);
        }
        if !self.session.is_reachable() {
            return self.drop_with(DropReason::Unreachable);
        }
        let bytes = match payload.encode() {
            Ok(b)  => b,
            Err(e) => {
                log::debug!("[link] encode failed: {}", e);
                return self.drop_with(DropReason::Failed);
            }
        };
        match self.session.transmit(&bytes) {
            Ok(()) => {
                self.sent += 1;
                self.reporter.delivered();
                SendOutcome::Sent
            }
            Err(LinkError::Unreachable) => self.drop_with(DropReason::Unreachable),
            Err(e) => {
                log::debug!("[link] transmit failed: {}", e);
                self.drop_with(DropReason::Failed)
            }
        }
    }

    pub fn send_control(&mut self, message: ControlMessage) -> SendOutcome {
        self.send(&Payload::Control(message))
    }

    /// Send `value` stamped with the current time.
    pub fn send_value(&mut self, value: f64) -> SendOutcome {
        self.send_control(ControlMessage::now(value))
    }

    pub fn send_greeting(&mut self, text: &str) -> SendOutcome {
        self.send(&Payload::greeting(text))
    }

    pub fn sent(&self)    -> u64 { self.sent }
    pub fn dropped(&self) -> u64 { self.dropped }

    /// Number of drop warnings actually logged.
    pub fn drop_reports(&self) -> u64 { self.reporter.reports }

    pub fn session(&self)         -> &S     { &self.session }
    pub fn session_mut(&mut self) -> &mut S { &mut self.session }

    fn drop_with(&mut self, reason: DropReason) -> SendOutcome {
        self.dropped += 1;
        self.reporter.dropped(reason);
        SendOutcome::Dropped(reason)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Listener: the receiving side
// ════════════════════════════════════════════════════════════════════════════

/// Counters shared between the listener thread and its handle.
#[derive(Debug, Default)]
pub struct ListenerStats {
    pub received:  AtomicU64,
    pub greetings: AtomicU64,
    pub malformed: AtomicU64,
}

/// Handle to a running receive loop.
///
/// Dropping the handle stops the thread at its next poll.
pub struct Listener {
    controls: Subscriber<ControlMessage>,
    greeting: Arc<Mutex<Option<String>>>,
    stats:    Arc<ListenerStats>,
    stop:     Arc<AtomicBool>,
    handle:   Option<JoinHandle<()>>,
}

/// How long the receive loop blocks before re-checking the stop flag.
const POLL: Duration = Duration::from_millis(50);

impl Listener {
    /// Activate `session` and start receiving on a new thread.
    ///
    /// Fails if the session cannot be created or does not reach
    /// [`SessionState::Activated`]; the caller decides whether that is fatal.
    pub fn spawn<S: Session + 'static>(mut session: S) -> Result<Self, LinkError> {
        let state = session.activate()?;
        if state != SessionState::Activated {
            log::warn!("[link] receiver session activation failed: {}", state);
            return Err(LinkError::NotActivated);
        }
        log::info!("[link] receiver session activated");

        let (publisher, controls) = latest::<ControlMessage>();
        let greeting = Arc::new(Mutex::new(None));
        let stats    = Arc::new(ListenerStats::default());
        let stop     = Arc::new(AtomicBool::new(false));

        let handle = {
            let greeting = Arc::clone(&greeting);
            let stats    = Arc::clone(&stats);
            let stop     = Arc::clone(&stop);
            thread::Builder::new()
                .name("link-listener".into())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) && publisher.is_connected() {
                        let bytes = match session.receive(POLL) {
                            Ok(Some(b)) => b,
                            Ok(None)    => continue,
                            Err(LinkError::Closed) => {
                                log::info!("[link] peer closed the session");
                                return;
                            }
                            Err(e) => {
                                // A socket that keeps failing must not spin.
                                log::debug!("[link] receive error: {}", e);
                                thread::sleep(POLL);
                                continue;
                            }
                        };
                        match Payload::decode(&bytes) {
                            Ok(Payload::Control(m)) => {
                                stats.received.fetch_add(1, Ordering::Relaxed);
                                publisher.publish(m);
                            }
                            Ok(Payload::Greeting(g)) => {
                                stats.greetings.fetch_add(1, Ordering::Relaxed);
                                log::info!("[link] greeting: {}", g.message);
                                *greeting.lock().unwrap_or_else(PoisonError::into_inner) =
                                    Some(g.message);
                            }
                            Err(e) => {
                                stats.malformed.fetch_add(1, Ordering::Relaxed);
                                log::warn!("[link] discarding payload: {}", e);
                            }
                        }
                    }
                })?
        };

        Ok(Listener { controls, greeting, stats, stop, handle: Some(handle) })
    }

    /// Newest control message since the last call, if any.
    pub fn take(&self) -> Option<ControlMessage> {
        self.controls.take()
    }

    /// Block up to `timeout` for a control message.
    pub fn take_timeout(&self, timeout: Duration) -> Option<ControlMessage> {
        self.controls.take_timeout(timeout)
    }

    pub fn last_greeting(&self) -> Option<String> {
        self.greeting.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn stats(&self) -> &ListenerStats { &self.stats }

    /// Stop the receive loop and wait for it.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                log::error!("[link] listener thread panicked");
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
