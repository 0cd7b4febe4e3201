//! One-slot, latest-value channel.
//!
//! A [`Publisher`] overwrites; a [`Subscriber`] takes whatever is newest.
//! Nothing is ever queued: publishing twice before a read loses the first
//! value.  Exactly one of each end exists per slot.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct State<T> {
    value:            Option<T>,
    /// Values overwritten before anyone read them.
    superseded:       u64,
    publisher_gone:   bool,
    subscriber_gone:  bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected publisher/subscriber pair.
pub fn latest<T>() -> (Publisher<T>, Subscriber<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            value:           None,
            superseded:      0,
            publisher_gone:  false,
            subscriber_gone: false,
        }),
        ready: Condvar::new(),
    });
    (Publisher { shared: Arc::clone(&shared) }, Subscriber { shared })
}

// ════════════════════════════════════════════════════════════════════════════
// Publisher
// ════════════════════════════════════════════════════════════════════════════

pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Publisher<T> {
    /// Replace the slot's value.  Returns `false` once the subscriber is gone.
    pub fn publish(&self, value: T) -> bool {
        let mut st = self.shared.lock();
        if st.subscriber_gone {
            return false;
        }
        if st.value.replace(value).is_some() {
            st.superseded += 1;
        }
        drop(st);
        self.shared.ready.notify_one();
        true
    }

    pub fn is_connected(&self) -> bool {
        !self.shared.lock().subscriber_gone
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.shared.lock().publisher_gone = true;
        self.shared.ready.notify_all();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Subscriber
// ════════════════════════════════════════════════════════════════════════════

pub struct Subscriber<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Subscriber<T> {
    /// Take the newest unread value, if any.  Never blocks.
    pub fn take(&self) -> Option<T> {
        self.shared.lock().value.take()
    }

    /// Wait up to `timeout` for a value.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let st = self.shared.lock();
        let (mut st, _) = self
            .shared
            .ready
            .wait_timeout_while(st, timeout, |s| s.value.is_none() && !s.publisher_gone)
            .unwrap_or_else(PoisonError::into_inner);
        st.value.take()
    }

    /// True once the publisher has been dropped and nothing is left to read.
    pub fn is_closed(&self) -> bool {
        let st = self.shared.lock();
        st.publisher_gone && st.value.is_none()
    }

    /// How many values were overwritten unread so far.
    pub fn superseded(&self) -> u64 {
        self.shared.lock().superseded
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        let mut st = self.shared.lock();
        st.subscriber_gone = true;
        st.value = None;
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn empty_slot_yields_nothing() {
        let (_tx, rx) = latest::<u32>();
        assert_eq!(rx.take(), None);
    }

    #[test]
    fn last_write_wins() {
        let (tx, rx) = latest();
        tx.publish(1);
        tx.publish(2);
        tx.publish(3);
        assert_eq!(rx.take(), Some(3));
        assert_eq!(rx.take(), None);
        assert_eq!(rx.superseded(), 2);
    }

    #[test]
    fn publish_after_subscriber_dropped_reports_false() {
        let (tx, rx) = latest();
        drop(rx);
        assert!(!tx.publish(5));
        assert!(!tx.is_connected());
    }

    #[test]
    fn closed_after_publisher_drop_and_drain() {
        let (tx, rx) = latest();
        tx.publish(9);
        drop(tx);
        assert!(!rx.is_closed());
        assert_eq!(rx.take(), Some(9));
        assert!(rx.is_closed());
    }

    #[test]
    fn take_timeout_wakes_on_publish() {
        let (tx, rx) = latest();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.publish("hello");
            tx
        });
        let got = rx.take_timeout(Duration::from_secs(5));
        assert_eq!(got, Some("hello"));
        drop(handle.join());
    }

    #[test]
    fn take_timeout_gives_up() {
        let (_tx, rx) = latest::<u8>();
        let start = Instant::now();
        assert_eq!(rx.take_timeout(Duration::from_millis(15)), None);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn take_timeout_returns_early_when_publisher_gone() {
        let (tx, rx) = latest::<u8>();
        drop(tx);
        let start = Instant::now();
        assert_eq!(rx.take_timeout(Duration::from_secs(5)), None);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
