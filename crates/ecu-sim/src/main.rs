//! ecu-sim — engine ECU simulator.
//!
//! Runs the engine model for a fixed duration, raises DTCs and events, and
//! emits one CAN frame per tick on SocketCAN or to the log.

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use ecu_sim::cli::Cli;
use ecu_sim::runner::Simulation;
use ecu_sim::sink::{CsvSink, FanoutSink, JsonLinesSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ecu-sim starting");

    // ── Load config ─────────────────────────────────────────────
    let config = cli.load_config()?;
    config.validate()?;
    tracing::info!(
        duration_secs = config.duration_secs,
        interval_secs = config.interval_secs,
        transport = ?config.transport,
        can_interface = %config.can_interface,
        "config loaded"
    );

    // ── Sinks ───────────────────────────────────────────────────
    let mut sink = FanoutSink::new();
    if let Some(dir) = &config.log_dir {
        let csv = CsvSink::open(dir)?;
        tracing::info!(dir = %dir.display(), "CSV logging enabled");
        sink.push(Box::new(csv));
    }
    if cli.json {
        sink.push(Box::new(JsonLinesSink::new(std::io::stdout())));
    }

    // ── Shutdown signal ─────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after current tick");
            let _ = stop_tx.send(true);
        }
    });

    // ── Run ─────────────────────────────────────────────────────
    let mut sim = Simulation::new(config)?;
    let summary = sim.run(&mut sink, stop_rx).await?;

    tracing::info!(
        ticks = summary.ticks,
        frames = summary.frames,
        dtcs_set = summary.dtcs_set,
        dtcs_cleared = summary.dtcs_cleared,
        events = summary.events,
        fallbacks = summary.fallbacks,
        active_dtcs = ?summary.active_dtcs,
        "ecu-sim stopped"
    );
    Ok(())
}
