//! The simulation loop.
//!
//! One tick runs fault injection, physics, diagnostics, encoding and
//! transmission in that order, then hands the results to the record sink.
//! Ticks never overlap and the stop signal is only checked between them.

use tokio::sync::watch;

use ecu_canbus::{EngineFrame, FrameEncoder};
use ecu_protocol::event::CAN_SEND_FAIL;
use ecu_protocol::{DiagnosticRecord, DtcStatus, EngineState, EventRecord};

use crate::config::SimConfig;
use crate::diagnostics::{DiagnosticState, DiagnosticsEngine};
use crate::engine::{EngineModel, NoiseSource};
use crate::error::SimResult;
use crate::fault::FaultInjector;
use crate::sink::{RecordSink, SinkRecord};
use crate::transport::{Delivery, Transport};

/// Everything one tick produced.
#[derive(Debug)]
pub struct TickOutput {
    pub state: EngineState,
    pub records: Vec<DiagnosticRecord>,
    pub frame: EngineFrame,
    pub delivery: Delivery,
}

/// Totals for a finished (or cancelled) run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub frames: u64,
    pub dtcs_set: usize,
    pub dtcs_cleared: usize,
    pub events: usize,
    pub fallbacks: u64,
    pub cancelled: bool,
    /// Codes still active when the run ended.
    pub active_dtcs: Vec<String>,
}

/// Owns all per-run state. Nothing here is shared across threads.
pub struct Simulation {
    config: SimConfig,
    model: EngineModel,
    injector: FaultInjector,
    noise: NoiseSource,
    diagnostics: DiagnosticsEngine,
    encoder: FrameEncoder,
    transport: Transport,
    state: EngineState,
    diag: DiagnosticState,
    /// Records produced before the first tick (transport open failures).
    startup: Vec<DiagnosticRecord>,
}

impl Simulation {
    /// Build a run with the transport named in `config`.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let (transport, open_failure) = Transport::connect(&config);
        let mut sim = Self::with_transport(config, transport)?;
        sim.startup.extend(open_failure.map(DiagnosticRecord::from));
        Ok(sim)
    }

    /// Build a run with an explicit transport (tests, embedding).
    pub fn with_transport(config: SimConfig, transport: Transport) -> SimResult<Self> {
        config.validate()?;
        let model = EngineModel::new(config.engine.clone());
        let diagnostics =
            DiagnosticsEngine::new(config.diagnostics.clone(), config.engine.redline_rpm);
        let state = model.initial_state();
        let diag = diagnostics.initial_state(&state);

        Ok(Self {
            injector: FaultInjector::new(config.seed, config.fault_rate),
            noise: NoiseSource::new(config.seed),
            encoder: FrameEncoder::new(),
            config,
            model,
            diagnostics,
            transport,
            state,
            diag,
            startup: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// State after the most recent tick.
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn diagnostic_state(&self) -> &DiagnosticState {
        &self.diag
    }

    /// Run a single tick.
    pub async fn step(&mut self) -> SimResult<TickOutput> {
        let dt = self.config.interval_secs;
        let tick = self.state.tick + 1;

        let fault = self.injector.next(tick, self.state.elapsed_secs);
        let noise = self.noise.next();
        let state = self.model.advance(&self.state, dt, fault, &noise)?;

        let (diag, mut records) = self.diagnostics.evaluate(&state, &self.diag);

        let frame = self.encoder.encode(&state);
        let delivery = self.transport.deliver(&frame).await;
        if let Delivery::FellBack(e) = &delivery {
            records.push(
                EventRecord::new(
                    CAN_SEND_FAIL,
                    state.tick,
                    state.elapsed_secs,
                    format!("CAN send failed: {e}"),
                )
                .into(),
            );
        }

        tracing::debug!(
            tick = state.tick,
            rpm = state.rpm,
            coolant_c = state.coolant_temp_c,
            pressure_kpa = state.oil_pressure_kpa,
            records = records.len(),
            "tick"
        );

        self.state = state.clone();
        self.diag = diag;

        Ok(TickOutput {
            state,
            records,
            frame,
            delivery,
        })
    }

    /// Run until the configured duration elapses or `stop` turns true.
    ///
    /// Sink failures end the run and are returned; transport failures never do.
    pub async fn run<S>(
        &mut self,
        sink: &mut S,
        mut stop: watch::Receiver<bool>,
    ) -> SimResult<RunSummary>
    where
        S: RecordSink + ?Sized,
    {
        let total = self.config.tick_count();
        let mut summary = RunSummary::default();

        tracing::info!(
            ticks = total,
            interval_secs = self.config.interval_secs,
            seed = ?self.config.seed,
            fault_rate = self.config.fault_rate,
            bus = self.transport.bus_name().unwrap_or("none"),
            "simulation starting"
        );

        for record in std::mem::take(&mut self.startup) {
            sink.append(SinkRecord::Diagnostic(&record))?;
            summary.events += 1;
        }

        while self.state.tick < total {
            if *stop.borrow() {
                tracing::info!(tick = self.state.tick, "stop requested");
                summary.cancelled = true;
                break;
            }

            let out = self.step().await?;
            sink.append(SinkRecord::State(&out.state))?;
            for record in &out.records {
                sink.append(SinkRecord::Diagnostic(record))?;
                match record {
                    DiagnosticRecord::Dtc(d) if d.status == DtcStatus::Active => summary.dtcs_set += 1,
                    DiagnosticRecord::Dtc(_) => summary.dtcs_cleared += 1,
                    DiagnosticRecord::Event(_) => summary.events += 1,
                }
            }
            sink.flush()?;

            summary.ticks += 1;
            if matches!(out.delivery, Delivery::FellBack(_)) {
                summary.fallbacks += 1;
            }

            if self.config.realtime && self.state.tick < total {
                tokio::select! {
                    () = tokio::time::sleep(self.config.interval()) => {}
                    Ok(()) = stop.changed() => {}
                }
            }
        }

        summary.frames = self.encoder.next_sequence();
        summary.active_dtcs = self
            .diag
            .active_codes()
            .into_iter()
            .map(String::from)
            .collect();

        tracing::info!(
            ticks = summary.ticks,
            dtcs_set = summary.dtcs_set,
            events = summary.events,
            fallbacks = summary.fallbacks,
            cancelled = summary.cancelled,
            "simulation finished"
        );
        Ok(summary)
    }
}
