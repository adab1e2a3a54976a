//! Runs the tracking loop against a synthetic moving target.
//!
//! Commands go to the configured serial port, to stdout with `--stdout`, or
//! nowhere when no actuator is attached.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pantilt_rs::actuator::{CommandSink, NullSink, WriterSink};
use pantilt_rs::config::CaptureConfig;
use pantilt_rs::sim::{self, MovingTarget};
use pantilt_rs::{Algorithm, Config, ControlEvent, TrackingSystem};

/// Command line arguments for the simulated tracking loop
#[derive(Parser, Debug)]
#[command(author, version, about = "Pan/tilt tracking loop on a synthetic target")]
struct Args {
    /// JSON configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the default configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Serial port of the actuator board
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Print commands to stdout instead of a serial port
    #[arg(long)]
    stdout: bool,

    /// Initial tracking algorithm (CSRT, KCF, MIL, MOSSE)
    #[arg(short, long)]
    algorithm: Option<Algorithm>,

    /// Frame width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Synthetic frame rate in Hz
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// Run time in seconds
    #[arg(short = 't', long, default_value = "10", value_parser = parse_seconds)]
    duration: Duration,

    /// Cycle the tracking algorithm every this many seconds
    #[arg(long, value_parser = parse_interval)]
    switch_every: Option<Duration>,
}

/// Non-negative, finite seconds that fit a [`Duration`].
fn parse_seconds(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{secs} s: {e}"))
}

/// Like [`parse_seconds`] but rejects zero.
fn parse_interval(s: &str) -> std::result::Result<Duration, String> {
    let interval = parse_seconds(s)?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".into());
    }
    Ok(interval)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    if let Some(path) = &args.write_config {
        Config::default()
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = build_config(&args)?;
    let sink = open_sink(&config, args.stdout);

    let frame_interval = Duration::from_secs_f64(1.0 / args.fps.max(1.0));
    let opener = move |capture: &CaptureConfig| -> std::result::Result<MovingTarget, pantilt_rs::capture::DeviceFailure> {
        Ok(MovingTarget::new(capture.width, capture.height).with_frame_interval(frame_interval))
    };
    let target_size = MovingTarget::new(config.capture.width, config.capture.height).target_size() as f32;
    let (cx, cy) = (
        config.capture.width as f32 / 2.0,
        config.capture.height as f32 / 2.0,
    );

    let mut system = TrackingSystem::start(config, opener, sim::tracker_factory, sink)
        .context("starting tracking system")?;

    // The target starts at the frame center
    let started = Instant::now();
    while system.capture_stats().published == 0 {
        if started.elapsed() > Duration::from_secs(5) {
            anyhow::bail!("no frames from the synthetic camera");
        }
        thread::sleep(Duration::from_millis(5));
    }
    system.handle_event(ControlEvent::Select {
        start: (cx - target_size, cy - target_size),
        end: (cx + target_size, cy + target_size),
    });

    let (events, rx) = unbounded();
    let stop = Arc::new(AtomicBool::new(false));
    let operator = {
        let stop = Arc::clone(&stop);
        let duration = args.duration;
        let switch_every = args.switch_every;
        thread::Builder::new()
            .name("operator".into())
            .spawn(move || {
                let start = Instant::now();
                let mut next_switch = switch_every.map(|d| start + d);
                while start.elapsed() < duration {
                    if let (Some(at), Some(every)) = (next_switch, switch_every) {
                        if Instant::now() >= at {
                            let _ = events.send(ControlEvent::SwitchAlgorithm);
                            next_switch = Some(at + every);
                        }
                    }
                    thread::sleep(Duration::from_millis(20));
                }
                stop.store(true, Ordering::SeqCst);
            })
            .context("spawning operator thread")?
    };

    let summary = system.run(&rx, &stop);
    let _ = operator.join();

    let status = system.status();
    let capture = system.capture_stats();
    info!(
        "Processed {} frames ({} tracked, {} lost), final state {} with {}, {:.1} fps",
        summary.processed,
        summary.tracked,
        summary.lost,
        status.state.label(),
        status.algorithm,
        status.fps
    );
    info!(
        "Captured {} frames, {} dropped",
        capture.published, capture.dropped
    );

    if let Some(stats) = system.shutdown() {
        info!("Dispatched {} commands, {} failed", stats.sent, stats.failed);
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config {
            capture: CaptureConfig {
                width: 640,
                height: 480,
                ..CaptureConfig::default()
            },
            ..Config::default()
        },
    };

    if let Some(width) = args.width {
        config.capture.width = width;
    }
    if let Some(height) = args.height {
        config.capture.height = height;
    }
    if let Some(algorithm) = args.algorithm {
        config.tracker.algorithm = algorithm;
    }
    if let Some(port) = &args.port {
        config.actuator.port = Some(port.clone());
    }
    if let Some(baud) = args.baud {
        config.actuator.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

fn open_sink(config: &Config, stdout: bool) -> Box<dyn CommandSink> {
    if stdout {
        return Box::new(WriterSink::new(io::stdout()));
    }

    #[cfg(feature = "serial")]
    if config.actuator.port.is_some() {
        match pantilt_rs::actuator::SerialSink::open(&config.actuator) {
            Ok(sink) => return Box::new(sink),
            Err(e) => warn!("{e}; running without actuator"),
        }
    }

    #[cfg(not(feature = "serial"))]
    if let Some(port) = &config.actuator.port {
        warn!("Built without serial support, ignoring port {port}");
    }

    Box::new(NullSink)
}
