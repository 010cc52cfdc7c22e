//! Shared harness for end-to-end simulator runs.
//!
//! Wires a full `Simulation` to a `MockCanInterface` bus and a `MemorySink`
//! so tests can inspect every frame and record a run produced.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use ecu_canbus::{CanFrame, MockCanInterface};
use ecu_protocol::{DiagnosticRecord, EngineState};
use ecu_sim::config::SimConfig;
use ecu_sim::runner::{RunSummary, Simulation};
use ecu_sim::sink::{MemorySink, StoredRecord};
use ecu_sim::transport::Transport;

/// Result of one complete run.
pub struct RunOutput {
    pub summary: RunSummary,
    pub sink: MemorySink,
    pub bus: Arc<MockCanInterface>,
}

impl RunOutput {
    pub fn states(&self) -> Vec<&EngineState> {
        self.sink.states()
    }

    pub fn records(&self) -> Vec<&DiagnosticRecord> {
        self.sink.records()
    }

    pub fn entries(&self) -> &[StoredRecord] {
        self.sink.entries()
    }

    pub fn frames(&self) -> Vec<CanFrame> {
        self.bus.sent_frames()
    }

    /// Codes of every record, in emission order.
    pub fn codes(&self) -> Vec<String> {
        self.records().iter().map(|r| r.code().to_string()).collect()
    }
}

/// Seeded config with CSV output disabled.
pub fn seeded(seed: u64, duration_secs: f64, fault_rate: f64) -> SimConfig {
    SimConfig {
        duration_secs,
        interval_secs: 0.5,
        seed: Some(seed),
        fault_rate,
        log_dir: None,
        ..Default::default()
    }
}

/// Run `config` to completion against `bus`.
pub async fn run_with_bus(config: SimConfig, bus: Arc<MockCanInterface>) -> RunOutput {
    let transport = Transport::with_bus(bus.clone(), config.transmit_timeout());
    let mut sim = Simulation::with_transport(config, transport).expect("valid config");
    let mut sink = MemorySink::new();
    let (_stop_tx, stop_rx) = watch::channel(false);

    let summary = sim.run(&mut sink, stop_rx).await.expect("run completes");
    RunOutput { summary, sink, bus }
}

/// Run `config` to completion against a healthy mock bus.
pub async fn run(config: SimConfig) -> RunOutput {
    run_with_bus(config, Arc::new(MockCanInterface::new())).await
}

pub fn stalled_bus() -> Arc<MockCanInterface> {
    Arc::new(MockCanInterface::stalled(Duration::from_secs(10)))
}
