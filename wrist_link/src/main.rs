//! wrist: the sensing device.
//!
//! Samples wrist attitude at a fixed cadence and sends each pitch to the
//! instrument over UDP.  Without motion hardware the `sweep` sensor stands
//! in for the wrist.

use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use theremin_map::{AttitudeSensor, MotionSampler, NoSensor, SweepSensor};
use wrist_link::{Link, Recorder, UdpSession, DEFAULT_PORT};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SensorKind {
    /// Pitch sweeps between ±90°.
    Sweep,
    /// No motion hardware; the session stays up but sends nothing.
    None,
}

/// Stream wrist pitch to a theremin.
#[derive(Parser, Debug)]
#[clap(author, about, long_about = None)]
struct Args {
    /// Instrument address
    #[clap(long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    peer: SocketAddr,

    /// Local address to send from
    #[clap(long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Sampling interval in milliseconds; fixed for the run
    #[clap(long, default_value_t = 100)]
    interval_ms: u64,

    #[clap(long, value_enum, default_value_t = SensorKind::Sweep)]
    sensor: SensorKind,

    /// Samples per full sweep
    #[clap(long, default_value_t = 60)]
    period: u32,

    /// Send a greeting before streaming
    #[clap(long)]
    greet: bool,

    /// Also send the latest pitch each time Enter is pressed
    #[clap(long)]
    manual: bool,

    /// Stop after this many samples
    #[clap(long)]
    count: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let sensor: Box<dyn AttitudeSensor> = match args.sensor {
        SensorKind::Sweep => Box::new(SweepSensor::new(args.period)),
        SensorKind::None  => Box::new(NoSensor),
    };
    let interval = Duration::from_millis(args.interval_ms.max(1));
    let sampler  = MotionSampler::new(sensor, interval);
    let link     = Link::new(UdpSession::sender(args.bind, args.peer));

    let mut recorder = Recorder::new(sampler, link);
    recorder
        .start()
        .with_context(|| format!("could not open a session to {}", args.peer))?;
    log::info!("[link] streaming to {} every {} ms", args.peer, interval.as_millis());

    if args.greet {
        recorder.send_greeting("Hello from the wrist");
    }

    let manual = if args.manual { Some(spawn_enter_reader()) } else { None };

    let mut ticks = 0u64;
    let mut next  = Instant::now();
    loop {
        if args.count.map_or(false, |n| ticks >= n) {
            break;
        }
        recorder.tick();
        ticks += 1;

        if let Some(rx) = &manual {
            while rx.try_recv().is_ok() {
                recorder.send_now();
            }
        }

        next += interval;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    recorder.stop();
    let link = recorder.link();
    log::info!(
        "[link] done: {} sent, {} dropped",
        link.sent(),
        link.dropped()
    );
    Ok(())
}

/// One message per line read from stdin.
fn spawn_enter_reader() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}
