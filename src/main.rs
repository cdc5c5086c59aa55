//! ComfortLink host controller entry point.
//!
//! Hexagonal architecture with one I/O thread and one control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SerialConnector   LogEventSink   FileStore    ReplayCommands  │
//! │  (Connector)       (EventSink)    (Training-   (CommandPort)   │
//! │                                    Store)                      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Cache · Safety · Ensemble · FSM · Trainer             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  link-io thread (reconnect, framing)  ·  retrain thread        │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use comfortlink::adapters::log_sink::LogEventSink;
use comfortlink::adapters::replay::{self, ReplayCommands};
use comfortlink::adapters::serial::{self, SerialConnector};
use comfortlink::adapters::store::{FileStore, MemoryStore};
use comfortlink::app::control_loop::{ControlLoop, StopReason};
use comfortlink::app::ports::TrainingStore;
use comfortlink::app::service::AppService;
use comfortlink::comfort::ModelHandle;
use comfortlink::config::SystemConfig;
use comfortlink::diagnostics::LinkStats;
use comfortlink::events::{EventInjector, link_queue};
use comfortlink::link::{LinkSettings, io_task};
use comfortlink::trainer;

#[derive(Debug, Parser)]
#[command(name = "comfortlink", version, about = "Comfort controller for the sensor/relay board")]
struct Cli {
    /// JSON configuration file (defaults apply to missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial device, overrides the config file
    #[arg(long, global = true)]
    port: Option<String>,

    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Directory holding dataset.jsonl and model.bin
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to the board and run the control loop
    Run {
        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Feed a file of recorded wire lines through the full pipeline
    Replay {
        file: PathBuf,
        /// Milliseconds between lines (0 = as fast as possible)
        #[arg(long, default_value_t = 0)]
        pace_ms: u64,
        /// Keep the dataset and model in memory instead of the data directory
        #[arg(long)]
        ephemeral: bool,
    },
    /// List serial devices
    ListPorts,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::ListPorts => list_ports(),
        Command::Run { duration } => run(config, duration.map(Duration::from_secs)),
        Command::Replay {
            file,
            pace_ms,
            ephemeral,
        } => {
            let pace = Duration::from_millis(pace_ms);
            if ephemeral {
                replay(config, &file, pace, MemoryStore::new())
            } else {
                let store = FileStore::open(&config.data_dir)
                    .with_context(|| format!("opening data dir {}", config.data_dir.display()))?;
                replay(config, &file, pace, store)
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<SystemConfig> {
    let mut config = match &cli.config {
        Some(path) => SystemConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SystemConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.port.clone_from(port);
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir.clone_from(dir);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn list_ports() -> Result<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        warn!("No serial ports found");
    }
    for p in ports {
        println!("{}\t{}", p.name, p.description);
    }
    Ok(())
}

/// Load or seed the dataset and model.
fn bootstrap(
    config: &SystemConfig,
    store: &mut impl TrainingStore,
    now: Instant,
    stats: &Arc<LinkStats>,
) -> Result<AppService> {
    let (dataset, model) = trainer::bootstrap(config, store).context("no usable comfort model")?;
    Ok(AppService::new(
        config.clone(),
        dataset,
        ModelHandle::new(model),
        Arc::clone(stats),
        now,
    ))
}

fn run(config: SystemConfig, duration: Option<Duration>) -> Result<()> {
    info!(
        "ComfortLink v{} on {} @ {} baud",
        env!("CARGO_PKG_VERSION"),
        config.port,
        config.baud_rate
    );

    let mut store = FileStore::open(&config.data_dir)
        .with_context(|| format!("opening data dir {}", config.data_dir.display()))?;
    let stats = Arc::new(LinkStats::new());
    let service = bootstrap(&config, &mut store, Instant::now(), &stats)?;

    let (events_tx, events_rx) = link_queue();
    let link = io_task::spawn(
        SerialConnector::from_config(&config),
        events_tx,
        Arc::clone(&stats),
        LinkSettings::from_config(&config),
    )
    .context("spawning link thread")?;

    let (mut control, handle) = ControlLoop::new(
        service,
        events_rx,
        config.staleness_check_interval(),
        store,
        link.commands(),
        LogEventSink::new(),
    );
    handle.shutdown_on_signal().context("installing signal handler")?;
    let deadline = duration.map(|d| Instant::now() + d);
    let reason = control.run(deadline);

    // Commands queued before the loop stopped are written before the port closes.
    link.shutdown();
    let snapshot = control.snapshot_handle().get();
    info!(
        "Stopped ({:?}) in {:?}: {} lines, {} commands, {} reconnects, model v{}",
        reason,
        snapshot.state,
        snapshot.link.lines_received,
        snapshot.link.commands_sent,
        snapshot.link.reconnect_attempts,
        snapshot.model_version
    );
    Ok(())
}

fn replay<S: TrainingStore>(
    config: SystemConfig,
    file: &Path,
    pace: Duration,
    mut store: S,
) -> Result<()> {
    let input = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let stats = Arc::new(LinkStats::new());
    let service = bootstrap(&config, &mut store, Instant::now(), &stats)?;

    let (events_tx, events_rx) = link_queue();
    let injector = EventInjector::new(events_tx);
    let (mut control, handle) = ControlLoop::new(
        service,
        events_rx,
        config.staleness_check_interval(),
        store,
        ReplayCommands::new(Arc::clone(&stats)),
        LogEventSink::new(),
    );
    handle.shutdown_on_signal().context("installing signal handler")?;

    let feeder = std::thread::Builder::new()
        .name("replay".into())
        .spawn(move || replay::feed(BufReader::new(input), &injector, pace))
        .context("spawning replay thread")?;

    let reason = control.run(None);
    let snapshot = control.snapshot_handle().get();
    // Dropping the loop closes the queue, which stops a feeder cut short by a signal.
    let (_, _, out, _) = control.into_parts();
    let fed = feeder
        .join()
        .map_err(|_| anyhow::anyhow!("replay thread panicked"))??;
    if reason != StopReason::QueueClosed {
        warn!("Replay stopped early: {reason:?}");
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    info!(
        "Replayed {} lines: {} accepted, {} discarded, {} commands ({} distinct changes)",
        fed,
        snapshot.link.telemetry_accepted + snapshot.link.feedback_accepted,
        snapshot.link.lines_discarded,
        out.sent().len(),
        out.sent().windows(2).filter(|w| w[0] != w[1]).count() + usize::from(!out.sent().is_empty())
    );
    Ok(())
}
