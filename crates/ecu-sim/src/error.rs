//! Simulation error types.

use thiserror::Error;

/// Errors that abort a simulation run.
///
/// Transport failures are not in here: they are recovered inside the loop.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid tick interval: {dt}s (must be finite and > 0)")]
    InvalidInterval { dt: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("record sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Errors raised by record sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for simulation results.
pub type SimResult<T> = Result<T, SimError>;
