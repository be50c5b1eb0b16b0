mod app;
mod capture;
mod components;
mod demo;
mod theme;

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use needle_core::config::Config;
use needle_core::{platform, ForcePublisher, MeterBus, MonotonicClock, SimulationDriver};

use crate::app::{App, Source};
use crate::demo::{TestSignal, DEMO_BLOCK_FRAMES, DEMO_SAMPLE_RATE};
use crate::theme::Theme;

/// Analog VU meter for the terminal.
#[derive(Debug, Parser)]
#[command(name = "needle", version)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Capture from the first input device whose name contains this
    #[arg(long, value_name = "NAME")]
    device: Option<String>,

    /// Drive the meters from a built-in test signal instead of an input device
    #[arg(long)]
    demo: bool,

    /// Print input device names and exit
    #[arg(long)]
    list_devices: bool,

    /// Skip the full-scale swing on startup
    #[arg(long)]
    no_sweep: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.list_devices {
        for name in capture::list_input_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    std::fs::create_dir_all(platform::data_dir())?;
    let log_path = platform::log_path();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("needle log: {}", log_path.display());

    info!("needle {} starting…", env!("CARGO_PKG_VERSION"));

    // ── Load config ──────────────────────────────────────────────────────────
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let mut config = loaded.inspect_err(|e| error!("failed to load config: {e:#}"))?;
    if let Some(device) = cli.device {
        config.audio.device = Some(device);
    }
    if cli.no_sweep {
        config.simulation.startup_sweep_ms = 0;
    }
    config
        .validate()
        .inspect_err(|e| error!("invalid config: {e}"))?;

    // ── Shared state ─────────────────────────────────────────────────────────
    let bus = MeterBus::new(config.meter.initial_displacement);
    let publisher = ForcePublisher::new(bus.clone(), config.force.curve);
    let driver = SimulationDriver::from_config(bus.clone(), &config.meter, MonotonicClock::new());

    // Gate the publisher before any source can reach it.
    if let Some(sweep) = config.simulation.startup_sweep() {
        app::start_sweep(bus.clone(), publisher.clone(), sweep);
    }

    // ── Input source ─────────────────────────────────────────────────────────
    let source = if cli.demo {
        let signal = TestSignal::new(DEMO_SAMPLE_RATE, DEMO_BLOCK_FRAMES);
        Source::Demo(demo::spawn_demo(signal, publisher))
    } else {
        let capture = capture::start(&config.audio, publisher)
            .inspect_err(|e| error!("audio capture failed: {e}"))?;
        Source::Capture(capture)
    };

    let theme = Theme::from_display(&config.display);
    App::new(bus, theme, source)
        .run(driver, config.simulation.tick_period())
        .await
}
