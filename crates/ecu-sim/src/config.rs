//! Simulator configuration, loadable from TOML and overridable from the CLI.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::diagnostics::DiagnosticThresholds;
use crate::engine::EngineParams;
use crate::error::{SimError, SimResult};

/// Where encoded frames go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportSelection {
    /// Log frames only.
    #[default]
    None,
    /// Try the configured SocketCAN interface, fall back to logging.
    Bus,
}

/// Top-level configuration for a simulation run.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Simulated run length in seconds.
    #[serde(default = "default_duration")]
    pub duration_secs: f64,
    /// Tick interval in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: f64,
    /// RNG seed. None draws from OS entropy (not reproducible).
    #[serde(default)]
    pub seed: Option<u64>,
    /// Per-tick fault probability in [0, 1].
    #[serde(default = "default_fault_rate")]
    pub fault_rate: f64,
    #[serde(default)]
    pub transport: TransportSelection,
    /// SocketCAN interface used when `transport = "bus"`.
    #[serde(default = "default_can_interface")]
    pub can_interface: String,
    /// Upper bound on a single frame send.
    #[serde(default = "default_transmit_timeout_ms")]
    pub transmit_timeout_ms: u64,
    /// Directory for CSV logs. None disables CSV output.
    #[serde(default = "default_log_dir")]
    pub log_dir: Option<PathBuf>,
    /// Sleep one interval between ticks (wall-clock pacing).
    #[serde(default)]
    pub realtime: bool,
    #[serde(default)]
    pub engine: EngineParams,
    #[serde(default)]
    pub diagnostics: DiagnosticThresholds,
}

fn default_duration() -> f64 {
    10.0
}

fn default_interval() -> f64 {
    0.5
}

fn default_fault_rate() -> f64 {
    0.02
}

fn default_can_interface() -> String {
    "vcan0".to_string()
}

fn default_transmit_timeout_ms() -> u64 {
    50
}

fn default_log_dir() -> Option<PathBuf> {
    Some(PathBuf::from("logs"))
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration(),
            interval_secs: default_interval(),
            seed: None,
            fault_rate: default_fault_rate(),
            transport: TransportSelection::default(),
            can_interface: default_can_interface(),
            transmit_timeout_ms: default_transmit_timeout_ms(),
            log_dir: default_log_dir(),
            realtime: false,
            engine: EngineParams::default(),
            diagnostics: DiagnosticThresholds::default(),
        }
    }
}

impl SimConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Reject values no run can be computed from.
    pub fn validate(&self) -> SimResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "duration must be > 0, got {}",
                self.duration_secs
            )));
        }
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(SimError::InvalidInterval {
                dt: self.interval_secs,
            });
        }
        if !(0.0..=1.0).contains(&self.fault_rate) {
            return Err(SimError::InvalidConfig(format!(
                "fault rate must be within [0, 1], got {}",
                self.fault_rate
            )));
        }
        if self.transport == TransportSelection::Bus && self.can_interface.trim().is_empty() {
            return Err(SimError::InvalidConfig(
                "bus transport selected but CAN interface name is empty".into(),
            ));
        }
        Ok(())
    }

    /// Number of ticks covering `duration_secs`. Division noise just above
    /// a whole number does not add a tick.
    pub fn tick_count(&self) -> u64 {
        let ratio = self.duration_secs / self.interval_secs;
        (ratio - 1e-9).ceil().max(1.0) as u64
    }

    pub fn transmit_timeout(&self) -> Duration {
        Duration::from_millis(self.transmit_timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }
}
