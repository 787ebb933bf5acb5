//! Demo driver: sing into one or two microphones and watch the paddle
//! positions scroll by.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse arguments; `--list-devices` prints the input devices and exits.
//! 3. Load [`AppConfig`] (from `--config` or the user settings file) and apply
//!    the device overrides.
//! 4. Start a [`PitchSession`].
//! 5. Poll both players at ~60 Hz, logging their positions, until `--seconds`
//!    elapse.
//! 6. Clean up.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use voice_paddle::{
    audio::{list_input_devices, DeviceId},
    config::AppConfig,
    controller::{PitchSession, Player},
    normalize::NormalizedPosition,
};

/// One frame at 60 Hz.
const FRAME: Duration = Duration::from_micros(16_667);

/// Positions are logged once per this many frames.
const LOG_EVERY_FRAMES: u64 = 15;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "voice-paddle", version, about = "Steer paddles by singing")]
struct Cli {
    /// Print the available input devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Right player's microphone (index, name, or "default").
    #[arg(short = '1', long = "right", value_name = "DEVICE")]
    right: Option<DeviceId>,

    /// Left player's microphone; requires --right.
    #[arg(short = '2', long = "left", value_name = "DEVICE", requires = "right")]
    left: Option<DeviceId>,

    /// Settings file to load instead of the user settings file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after this many seconds; runs until killed when omitted.
    #[arg(long, value_name = "N")]
    seconds: Option<f64>,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Arguments
    let cli = Cli::parse();
    if cli.list_devices {
        return print_devices();
    }

    // 3. Configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e:#}); using defaults");
            AppConfig::default()
        }),
    };
    if let Some(right) = cli.right {
        config.session.right_device = right;
    }
    if let Some(left) = cli.left {
        config.session.left_device = Some(left);
    }

    let limit = match cli.seconds {
        Some(s) if !(s.is_finite() && s > 0.0) => bail!("--seconds must be a positive number"),
        Some(s) => Some(Duration::from_secs_f64(s)),
        None => None,
    };

    // 4. Session
    let mut session = PitchSession::initialize(&config).context("starting microphones")?;
    log::info!("voice-paddle running; players: {:?}", session.players());

    // 5. Poll loop
    let started = Instant::now();
    let mut frame: u64 = 0;
    while limit.map_or(true, |l| started.elapsed() < l) {
        if frame % LOG_EVERY_FRAMES == 0 {
            let line = session
                .players()
                .into_iter()
                .map(|p| format!("{p}={}", show(session.position(p))))
                .collect::<Vec<_>>()
                .join("  ");
            log::info!("{line}");
        }
        frame += 1;
        thread::sleep(FRAME);
    }

    // 6. Teardown
    if let Some(c) = session.controller(Player::Right) {
        log::debug!("right: {} chunks dropped", c.overflow_count());
    }
    session.cleanup();
    log::info!("voice-paddle stopped");
    Ok(())
}

fn print_devices() -> Result<()> {
    let devices = list_input_devices().context("listing input devices")?;
    if devices.is_empty() {
        println!("no input devices found");
    }
    for dev in devices {
        println!(
            "{:>3}  {}  ({} ch)",
            dev.index, dev.name, dev.max_input_channels
        );
    }
    Ok(())
}

fn show(pos: NormalizedPosition) -> String {
    match pos.value() {
        Some(v) => format!("{v:.3}"),
        None => "-----".to_owned(),
    }
}
