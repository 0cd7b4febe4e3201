//! UDP session.
//!
//! One JSON payload per datagram.  The sender connects its socket to the
//! peer so that an ICMP port-unreachable surfaces as `ConnectionRefused`
//! on a later send; the session then reports the peer unreachable for a
//! short backoff instead of retrying.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::error::LinkError;
use crate::session::{Session, SessionState};

/// Largest payload accepted on receive.
const MAX_DATAGRAM: usize = 2048;

/// How long a refused peer is treated as unreachable.
pub const UNREACHABLE_BACKOFF: Duration = Duration::from_millis(500);

pub struct UdpSession {
    bind:              SocketAddr,
    peer:              Option<SocketAddr>,
    socket:            Option<UdpSocket>,
    state:             SessionState,
    unreachable_until: Option<Instant>,
}

impl UdpSession {
    /// A session that sends to `peer`.
    pub fn sender(bind: SocketAddr, peer: SocketAddr) -> Self {
        Self::with(bind, Some(peer))
    }

    /// A session that only listens on `bind`.
    pub fn receiver(bind: SocketAddr) -> Self {
        Self::with(bind, None)
    }

    fn with(bind: SocketAddr, peer: Option<SocketAddr>) -> Self {
        UdpSession { bind, peer, socket: None, state: SessionState::NotActivated, unreachable_until: None }
    }

    /// Address actually bound, once activated.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl Session for UdpSession {
    fn activate(&mut self) -> Result<SessionState, LinkError> {
        if self.state == SessionState::Activated {
            return Ok(self.state);
        }
        let socket = UdpSocket::bind(self.bind)
            .map_err(|source| LinkError::Bind { addr: self.bind.to_string(), source })?;
        if let Some(peer) = self.peer {
            if let Err(e) = socket.connect(peer) {
                log::warn!("[link] cannot route to {}: {}", peer, e);
                self.state = SessionState::Inactive;
                return Ok(self.state);
            }
        }
        if let Ok(addr) = socket.local_addr() {
            log::debug!("[link] bound {}", addr);
        }
        self.socket = Some(socket);
        self.state = SessionState::Activated;
        Ok(self.state)
    }

    fn state(&self) -> SessionState { self.state }

    fn is_reachable(&self) -> bool {
        if self.state != SessionState::Activated || self.peer.is_none() {
            return false;
        }
        match self.unreachable_until {
            Some(t) => Instant::now() >= t,
            None    => true,
        }
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let socket = self.socket.as_ref().ok_or(LinkError::NotActivated)?;
        match socket.send(bytes) {
            Ok(_) => {
                self.unreachable_until = None;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                self.unreachable_until = Some(Instant::now() + UNREACHABLE_BACKOFF);
                Err(LinkError::Unreachable)
            }
            Err(e) => Err(LinkError::Io(e)),
        }
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, LinkError> {
        let socket = self.socket.as_ref().ok_or(LinkError::NotActivated)?;
        socket.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        let mut buf = [0u8; MAX_DATAGRAM];
        match socket.recv(&mut buf) {
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            // A refused earlier send shows up here on some platforms.
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => Ok(None),
            Err(e) => Err(LinkError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn datagram_reaches_receiver() {
        let mut rx = UdpSession::receiver(localhost());
        assert_eq!(rx.activate().unwrap(), SessionState::Activated);
        let addr = rx.local_addr().unwrap();

        let mut tx = UdpSession::sender(localhost(), addr);
        assert_eq!(tx.activate().unwrap(), SessionState::Activated);
        tx.transmit(br#"{"frequency":0.5}"#).unwrap();

        let got = rx.receive(Duration::from_secs(2)).unwrap();
        assert_eq!(got.as_deref(), Some(&br#"{"frequency":0.5}"#[..]));
    }

    #[test]
    fn receive_times_out_quietly() {
        let mut rx = UdpSession::receiver(localhost());
        rx.activate().unwrap();
        assert_eq!(rx.receive(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn receiver_has_no_peer() {
        let mut rx = UdpSession::receiver(localhost());
        rx.activate().unwrap();
        assert!(!rx.is_reachable());
    }

    #[test]
    fn bind_conflict_is_a_bind_error() {
        let mut first = UdpSession::receiver(localhost());
        first.activate().unwrap();
        let taken = first.local_addr().unwrap();
        let mut second = UdpSession::receiver(taken);
        assert!(matches!(second.activate(), Err(LinkError::Bind { .. })));
    }

    #[test]
    fn inactive_session_cannot_transmit() {
        let mut tx = UdpSession::sender(localhost(), localhost());
        assert!(matches!(tx.transmit(b"x"), Err(LinkError::NotActivated)));
    }
}
