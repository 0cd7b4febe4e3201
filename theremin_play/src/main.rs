//! theremin: interactive entry point.

use anyhow::Context;
use clap::Parser;
use theremin_play::app::run;
use theremin_play::config::{AppConfig, CliArgs, LinkMode};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    let cfg  = AppConfig::from_args(&args).context("loading configuration")?;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Theremin · wrist for pitch, hand for volume           ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Band:   {:.0}–{:.0} Hz", cfg.min_frequency, cfg.max_frequency);
    match cfg.link {
        LinkMode::Loopback => println!("  Wrist:  simulated (Up/Down to tilt)"),
        LinkMode::Udp      => println!("  Wrist:  listening on {}", cfg.bind),
    }
    println!("  Output: {:?}", cfg.output);
    println!();
    println!("  Opening visualizer window…");
    println!();

    run(cfg)
}
