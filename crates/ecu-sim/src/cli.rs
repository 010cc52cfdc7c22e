//! Command-line flags. Every flag is optional and overrides the matching
//! config file value.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{SimConfig, TransportSelection};

#[derive(Debug, Parser)]
#[command(
    name = "ecu-sim",
    version,
    about = "Simulate an engine ECU: physics, fault injection, DTCs and CAN frames",
    long_about = None
)]
pub struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, value_name = "FILE", env = "ECU_SIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Simulated run length in seconds
    #[arg(long, value_name = "SECS")]
    pub duration: Option<f64>,

    /// Tick interval in seconds
    #[arg(long, value_name = "SECS")]
    pub interval: Option<f64>,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Per-tick fault probability in [0, 1]
    #[arg(long)]
    pub fault_rate: Option<f64>,

    /// Send frames on the SocketCAN interface
    #[arg(long, conflicts_with = "no_can")]
    pub vcan: bool,

    /// Log frames only, never open a CAN socket
    #[arg(long)]
    pub no_can: bool,

    /// SocketCAN interface name used with --vcan
    #[arg(long, value_name = "IFACE", env = "ECU_SIM_CAN_IFACE")]
    pub can_iface: Option<String>,

    /// Upper bound on a single frame send
    #[arg(long, value_name = "MS")]
    pub transmit_timeout_ms: Option<u64>,

    /// Directory for the CSV logs
    #[arg(long, value_name = "DIR", conflicts_with = "no_csv")]
    pub log_dir: Option<PathBuf>,

    /// Disable CSV logs
    #[arg(long)]
    pub no_csv: bool,

    /// Sleep one interval between ticks
    #[arg(long)]
    pub realtime: bool,

    /// Write every state and diagnostic record to stdout as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Emit tracing output as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Load the config file (if any) and apply flag overrides.
    pub fn load_config(&self) -> anyhow::Result<SimConfig> {
        let base = match &self.config {
            Some(path) => SimConfig::from_file(&path.to_string_lossy())?,
            None => SimConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Overlay the flags onto `config`.
    pub fn apply(&self, mut config: SimConfig) -> SimConfig {
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(rate) = self.fault_rate {
            config.fault_rate = rate;
        }
        if self.vcan {
            config.transport = TransportSelection::Bus;
        }
        if self.no_can {
            config.transport = TransportSelection::None;
        }
        if let Some(iface) = &self.can_iface {
            config.can_interface = iface.clone();
        }
        if let Some(ms) = self.transmit_timeout_ms {
            config.transmit_timeout_ms = ms;
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if self.no_csv {
            config.log_dir = None;
        }
        if self.realtime {
            config.realtime = true;
        }
        config
    }
}
