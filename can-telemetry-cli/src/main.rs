//! CAN Telemetry Gateway CLI
//!
//! Command-line harness around the can-telemetry library:
//! - Replays candump logs through the dispatcher
//! - Drives the dispatcher from a deterministic vehicle simulator
//! - Prints the registered signal table
//!
//! Accepted values are written as JSON lines, one per emission.

use anyhow::{Context, Result};
use can_telemetry::signals::{catalog, dbc, table};
use can_telemetry::{
    Dispatcher, DrainSummary, Frame, FrameSource, GatewayConfig, Registry, TransportSink,
};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

mod config;
mod replay;
mod report;
mod simulator;
mod sink;

use config::AppConfig;
use report::StatusReport;
use sink::JsonLineSink;

/// CAN Telemetry Gateway - decode CAN frames into rate-limited telemetry
#[derive(Parser, Debug)]
#[command(name = "can-telemetry")]
#[command(about = "Decode CAN frames into rate-limited telemetry values", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Additional TOML signal table(s) (can be repeated)
    #[arg(long, value_name = "FILE", global = true)]
    table: Vec<PathBuf>,

    /// DBC file(s) to import (can be repeated)
    #[arg(long, value_name = "FILE", global = true)]
    dbc: Vec<PathBuf>,

    /// Do not register the built-in vehicle catalog
    #[arg(long, global = true)]
    no_catalog: bool,

    /// Output file for JSON lines (default: stdout)
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a candump log file
    Replay {
        /// candump -l log file
        file: PathBuf,

        #[command(flatten)]
        run: RunOptions,
    },
    /// Run the built-in vehicle simulator
    Simulate {
        /// Simulated duration in seconds
        #[arg(long, default_value_t = 600)]
        seconds: u64,

        /// Time between frame bursts (overrides simulator.step_ms)
        #[arg(long, value_name = "MS")]
        step_ms: Option<u64>,

        #[command(flatten)]
        run: RunOptions,
    },
    /// Print the registered signal table
    Signals,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct RunOptions {
    /// Maximum number of frames to process
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,

    /// Republish every signal at this period of frame time
    #[arg(long, value_name = "MS")]
    republish_ms: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Telemetry CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using telemetry library v{}", can_telemetry::VERSION);

    let app = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let gateway = app.gateway_config();
    let registry = build_registry(&app, &args, &gateway)?;

    match &args.command {
        Command::Signals => {
            print_signals(&registry, &app.transport.base_topic);
            Ok(())
        }
        Command::Replay { file, run } => {
            let log = replay::ReplayLog::load(file)
                .with_context(|| format!("Failed to load candump log: {:?}", file))?;
            execute("Replay", log, registry, gateway, &app, &args, *run)
        }
        Command::Simulate {
            seconds,
            step_ms,
            run,
        } => {
            let mut sim_config = app.simulator.clone();
            if let Some(step) = step_ms {
                anyhow::ensure!(*step > 0, "--step-ms must be greater than zero");
                sim_config.step_ms = *step;
            }
            let sim = simulator::VehicleSimulator::new(&sim_config, seconds.saturating_mul(1000));
            execute("Simulate", sim, registry, gateway, &app, &args, *run)
        }
    }
}

/// Register catalog, table and DBC signals in that order
fn build_registry(app: &AppConfig, args: &Args, gateway: &GatewayConfig) -> Result<Registry> {
    let mut registry = Registry::new();

    if app.signals.builtin && !args.no_catalog {
        catalog::register_catalog(&mut registry, gateway)?;
    }

    for path in app.signals.tables.iter().chain(&args.table) {
        let definitions = table::load_table(path)
            .with_context(|| format!("Failed to load signal table: {:?}", path))?;
        let count = registry.register_definitions(definitions, gateway)?;
        log::info!("Registered {} signals from {:?}", count, path);
    }

    for path in app.signals.dbc_files.iter().chain(&args.dbc) {
        let definitions = dbc::parse_dbc_file(path, app.signals.dbc_tier)
            .with_context(|| format!("Failed to import DBC: {:?}", path))?;
        let count = registry.register_definitions(definitions, gateway)?;
        log::info!("Registered {} signals from {:?}", count, path);
    }

    if registry.is_empty() {
        log::warn!("No signals registered, every frame will be ignored");
    }
    Ok(registry)
}

fn execute<S: FrameSource>(
    mode: &str,
    source: S,
    registry: Registry,
    gateway: GatewayConfig,
    app: &AppConfig,
    args: &Args,
    run: RunOptions,
) -> Result<()> {
    let mut dispatcher = Dispatcher::with_config(registry, gateway);

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut sink = JsonLineSink::new(writer, app.transport.base_topic.clone());

    let max_frames = run.max_frames.unwrap_or(usize::MAX);
    let summary = match run.republish_ms {
        Some(period) if period > 0 => {
            drain_with_republish(&mut dispatcher, source, &mut sink, max_frames, period)
        }
        _ => dispatcher.drain(source, &mut sink, max_frames),
    };
    sink.flush().context("Failed to flush output")?;

    log::info!(
        "Processed {} frames, published {} values ({} delivery failures)",
        summary.frames,
        summary.emissions,
        summary.delivery_failures
    );

    if !args.quiet {
        let report = StatusReport::collect(mode, &app.transport.base_topic, &dispatcher, summary);
        eprintln!("{}", report);
    }

    Ok(())
}

/// Records the timestamp of the last frame handed out
struct Tracked<S> {
    inner: S,
    last_ms: Option<u64>,
}

impl<S: FrameSource> FrameSource for Tracked<S> {
    fn try_receive(&mut self) -> Option<Frame> {
        let frame = self.inner.try_receive()?;
        self.last_ms = Some(frame.timestamp_ms);
        Some(frame)
    }
}

/// Drain frame by frame, clearing all emission history every `period_ms`
fn drain_with_republish<S, T>(
    dispatcher: &mut Dispatcher,
    source: S,
    mut sink: T,
    max_frames: usize,
    period_ms: u64,
) -> DrainSummary
where
    S: FrameSource,
    T: TransportSink,
{
    let mut source = Tracked {
        inner: source,
        last_ms: None,
    };
    let mut total = DrainSummary::default();
    let mut next_republish: Option<u64> = None;

    while total.frames < max_frames {
        let step = dispatcher.drain(&mut source, &mut sink, 1);
        if step.frames == 0 {
            break;
        }
        total.frames += step.frames;
        total.emissions += step.emissions;
        total.delivery_failures += step.delivery_failures;

        let Some(now) = source.last_ms else { continue };
        let deadline = *next_republish.get_or_insert(now.saturating_add(period_ms));
        if now >= deadline {
            log::debug!("Republishing all signals at t={} ms", now);
            dispatcher.force_publish_all();
            next_republish = Some(now.saturating_add(period_ms));
        }
    }

    total
}

fn print_signals(registry: &Registry, base_topic: &str) {
    println!(
        "{:<20} {:>8} {:>7} {:>8} {:>10} {:<10} {:>10} {:>9}  {}",
        "NAME", "FRAME", "BITS", "SCALE", "OFFSET", "UNIT", "INTERVAL", "TOLERANCE", "TOPIC"
    );
    for (_, signal) in registry.iter() {
        let d = signal.descriptor();
        let p = signal.policy();
        println!(
            "{:<20} {:>#8X} {:>3}+{:<3} {:>8} {:>10} {:<10} {:>8}ms {:>9}  {}/{}",
            d.name,
            d.frame_id,
            d.start_bit,
            d.bit_length,
            d.scale,
            d.offset,
            d.unit,
            p.min_interval_ms(),
            p.tolerance(),
            base_topic.trim_end_matches('/'),
            d.topic
        );
    }
    let stats = registry.stats();
    println!(
        "\n{} signals on {} frame IDs",
        stats.num_signals, stats.num_frames
    );
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
