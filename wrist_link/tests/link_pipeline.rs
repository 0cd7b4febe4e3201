//! End-to-end behaviour of the link over an in-process session pair.

use std::sync::atomic::Ordering;
use std::time::Duration;

use more_asserts::assert_ge;
use theremin_map::{ParameterMapper, SweepSensor, MotionSampler, DEFAULT_INTERVAL};
use wrist_link::{
    loopback, ControlMessage, DropReason, Link, Listener, Recorder, SendOutcome,
};

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn full_scale_value_maps_to_top_of_range() {
    let (tx, rx, _) = loopback::pair();
    let listener = Listener::spawn(rx).unwrap();
    let mut link = Link::new(tx);
    link.activate().unwrap();

    assert_eq!(link.send_control(ControlMessage::new(1.0, 1_700_000_000.0)), SendOutcome::Sent);

    let msg = listener.take_timeout(WAIT).unwrap();
    assert_eq!(ParameterMapper::default().map_raw(msg.value), 1050.0);
}

#[test]
fn unreachable_peer_drops_and_logs_once() {
    let (tx, rx, ctl) = loopback::pair();
    let listener = Listener::spawn(rx).unwrap();
    let mut link = Link::new(tx);
    link.activate().unwrap();

    ctl.set_reachable(false);
    for _ in 0..5 {
        assert_eq!(link.send_value(0.3), SendOutcome::Dropped(DropReason::Unreachable));
    }
    assert_ge!(link.dropped(), 5);
    assert_eq!(link.sent(), 0);
    assert_eq!(link.drop_reports(), 1);
    assert_eq!(listener.take_timeout(Duration::from_millis(100)), None);
}

#[test]
fn receiver_sees_only_the_newest_message() {
    let (tx, rx, _) = loopback::pair();
    let listener = Listener::spawn(rx).unwrap();
    let mut link = Link::new(tx);
    link.activate().unwrap();

    for v in [0.1, 0.2, 0.3] {
        link.send_control(ControlMessage::new(v, 1.0));
    }
    // Let the listener drain all three before reading.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(listener.take().map(|m| m.value), Some(0.3));
    assert_eq!(listener.take(), None);
    assert_ge!(listener.stats().received.load(Ordering::Relaxed), 3);
}

#[test]
fn greeting_is_logged_but_not_forwarded() {
    let (tx, rx, _) = loopback::pair();
    let listener = Listener::spawn(rx).unwrap();
    let mut link = Link::new(tx);
    link.activate().unwrap();

    assert!(link.send_greeting("Hello iPhone").is_sent());
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(listener.last_greeting().as_deref(), Some("Hello iPhone"));
    assert_eq!(listener.take(), None);
}

#[test]
fn recorder_streams_into_listener() {
    let (tx, rx, _) = loopback::pair();
    let listener = Listener::spawn(rx).unwrap();
    let mut rec = Recorder::new(
        MotionSampler::new(SweepSensor::new(4), DEFAULT_INTERVAL),
        Link::new(tx),
    );
    rec.start().unwrap();
    for _ in 0..3 {
        rec.tick();
    }
    let msg = listener.take_timeout(WAIT).unwrap();
    assert!(msg.value.is_finite());
    assert!(msg.timestamp > 0.0);
    listener.shutdown();
}
