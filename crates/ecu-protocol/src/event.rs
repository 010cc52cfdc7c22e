use serde::{Deserialize, Serialize};

// ── Event codes ─────────────────────────────────────────────────

pub const FAN_ON: &str = "FAN_ON";
pub const FAN_OFF: &str = "FAN_OFF";
pub const DERATE_ON: &str = "DERATE_ON";
pub const DERATE_OFF: &str = "DERATE_OFF";
pub const PRESSURE_SPIKE: &str = "PRESSURE_SPIKE";
pub const OVERSPEED: &str = "OVERSPEED";
pub const OVERSPEED_CLEAR: &str = "OVERSPEED_CLEAR";

/// The configured CAN interface could not be opened; the run uses the null transport.
pub const CAN_OPEN_FAIL: &str = "CAN_OPEN_FAIL";

/// A frame could not be sent on the bus and went to the null transport instead.
pub const CAN_SEND_FAIL: &str = "CAN_SEND_FAIL";

/// A one-shot notable occurrence (fan switched on, derate engaged, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event code (e.g., "FAN_ON").
    pub code: String,
    /// Tick on which the event fired.
    pub tick: u64,
    /// Simulated seconds at the event.
    pub elapsed_secs: f64,
    /// Free-form detail.
    pub payload: String,
}

impl EventRecord {
    pub fn new(code: impl Into<String>, tick: u64, elapsed_secs: f64, payload: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            tick,
            elapsed_secs,
            payload: payload.into(),
        }
    }
}
