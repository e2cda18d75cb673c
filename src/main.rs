use anyhow::Result;
use clap::Parser;
use crossbeam_channel::Receiver;
use log::{info, warn};
use std::io::BufRead;
use std::time::{Duration, Instant};

mod animations;
mod audio;
mod config;
mod control;
mod led;
mod pipeline;

use audio::{CpalSource, SampleSource, SilenceSource};
use config::Config;
use pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "lumabeat", about = "Audio-reactive LED animation controller")]
struct Args {
    /// Path to a JSON config file; defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Input device name; the system default is used when omitted.
    #[arg(long)]
    device: Option<String>,

    /// List available input devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Cap the frame rate (frames per second).
    #[arg(long)]
    fps_cap: Option<u32>,
}

/// Manual override commands read from stdin:
/// `n` next, `p` previous, `a` toggle auto-switch, `q` quit.
enum Command {
    Next,
    Previous,
    ToggleAuto,
    Quit,
}

fn spawn_stdin_reader() -> Receiver<Command> {
    let (sender, receiver) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let command = match line.as_deref().map(str::trim) {
                Ok("n") => Command::Next,
                Ok("p") => Command::Previous,
                Ok("a") => Command::ToggleAuto,
                Ok("q") => Command::Quit,
                Ok(_) => continue,
                Err(_) => break,
            };
            if sender.send(command).is_err() {
                break;
            }
        }
    });
    receiver
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_devices {
        for name in CpalSource::device_names()? {
            println!("{name}");
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.validate()?;

    info!("Starting lumabeat audio-reactive LED controller");

    let source: Box<dyn SampleSource> = match CpalSource::new(args.device.as_deref()) {
        Ok(source) => Box::new(source),
        Err(e) => {
            warn!("Audio input unavailable ({}), running on silence", e);
            Box::new(SilenceSource)
        }
    };

    let mut pipeline = Pipeline::new(&config, source)?;
    let commands = spawn_stdin_reader();

    info!(
        "Controller initialized: {} LEDs, block size {} at {} Hz",
        config.led_count, config.block_size, config.sample_rate
    );

    let start = Instant::now();
    let min_frame = args
        .fps_cap
        .map(|fps| Duration::from_millis(1000 / fps.max(1) as u64));
    let mut last_status_ms = 0u64;

    loop {
        let frame_start = Instant::now();
        let now_ms = start.elapsed().as_millis() as u64;

        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Next => pipeline.request_next(now_ms),
                Command::Previous => pipeline.request_previous(now_ms),
                Command::ToggleAuto => pipeline.toggle_auto_switch(),
                Command::Quit => {
                    info!("Quit requested");
                    return Ok(());
                }
            }
        }

        let report = pipeline.step(now_ms);

        if now_ms.saturating_sub(last_status_ms) > 2000 {
            let strip = pipeline.strip();
            let lit = strip
                .pixels()
                .iter()
                .filter(|p| p.r > 0 || p.g > 0 || p.b > 0)
                .count();
            info!(
                "[{}] vol {:.2} loud {:.0} bpm {:.0} mood {} {} auto={} lit {}/{} ({})",
                report.animation,
                report.volume,
                report.loudness,
                report.bpm,
                report.mood.text(),
                if report.signal_presence { "signal" } else { "no signal" },
                pipeline.is_auto_switch_enabled(),
                lit,
                strip.len(),
                report.hold_reason.text(),
            );
            last_status_ms = now_ms;
        }

        if let Some(min) = min_frame {
            let elapsed = frame_start.elapsed();
            if elapsed < min {
                std::thread::sleep(min - elapsed);
            }
        }
    }
}
