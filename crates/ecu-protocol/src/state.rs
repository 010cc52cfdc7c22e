use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ── Physical envelope ───────────────────────────────────────────

/// Upper bound for engine speed in rpm.
pub const RPM_MAX: f64 = 8000.0;

/// Upper bound for oil pressure in kPa.
pub const PRESSURE_MAX_KPA: f64 = 400.0;

/// Lower bound for any fluid temperature in celsius.
pub const TEMP_MIN_C: f64 = -40.0;

/// Upper bound for any fluid temperature in celsius (coolant boiling limit).
pub const TEMP_MAX_C: f64 = 150.0;

// ── Fault kinds ─────────────────────────────────────────────────

/// A fault the injector can force onto the engine model for one tick.
///
/// "No fault" is expressed as `Option::<FaultKind>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// RPM clamped below the derate ceiling.
    Derate,
    /// Coolant temperature surge.
    OverTemp,
    /// Oil pressure surge.
    PressureSpike,
    /// Oil pump output collapses.
    PressureDrop,
    /// Fan relay welded closed.
    FanStuckOn,
    /// Fan relay stuck open.
    FanStuckOff,
    /// Coolant sensor reports an offset reading.
    SensorGlitch,
}

impl FaultKind {
    /// Every fault variant, in declaration order.
    pub const ALL: [FaultKind; 7] = [
        Self::Derate,
        Self::OverTemp,
        Self::PressureSpike,
        Self::PressureDrop,
        Self::FanStuckOn,
        Self::FanStuckOff,
        Self::SensorGlitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Derate => "derate",
            Self::OverTemp => "over_temp",
            Self::PressureSpike => "pressure_spike",
            Self::PressureDrop => "pressure_drop",
            Self::FanStuckOn => "fan_stuck_on",
            Self::FanStuckOff => "fan_stuck_off",
            Self::SensorGlitch => "sensor_glitch",
        }
    }

    /// Event code emitted when this fault appears (e.g. `FAULT_DERATE`).
    pub fn event_code(&self) -> &'static str {
        match self {
            Self::Derate => "FAULT_DERATE",
            Self::OverTemp => "FAULT_OVER_TEMP",
            Self::PressureSpike => "FAULT_PRESSURE_SPIKE",
            Self::PressureDrop => "FAULT_PRESSURE_DROP",
            Self::FanStuckOn => "FAULT_FAN_STUCK_ON",
            Self::FanStuckOff => "FAULT_FAN_STUCK_OFF",
            Self::SensorGlitch => "FAULT_SENSOR_GLITCH",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Engine state ────────────────────────────────────────────────

/// Snapshot of the simulated engine after one tick.
///
/// Produced fresh by the engine model every tick; never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    /// Tick index (0 = initial state before the first step).
    pub tick: u64,
    /// Simulated seconds since start.
    pub elapsed_secs: f64,
    /// Throttle position applied this tick (0.0 – 1.0).
    pub throttle: f64,
    /// Engine speed in rpm.
    pub rpm: f64,
    /// True coolant temperature in celsius. Drives the physics.
    pub coolant_temp_c: f64,
    /// Error on the coolant sensor this tick (non-zero only during a glitch).
    #[serde(default)]
    pub coolant_sensor_offset_c: f64,
    /// Oil temperature in celsius.
    pub oil_temp_c: f64,
    /// Oil pressure in kPa.
    pub oil_pressure_kpa: f64,
    /// Oil condition, 1.0 = fresh, 0.0 = pump starved.
    pub oil_health: f64,
    /// Current RPM ceiling (lowered while protective derate is latched).
    pub rpm_ceiling: f64,
    /// Whether the cooling fan is running.
    pub fan_on: bool,
    /// Oil-temperature derate latch.
    pub protective_derate: bool,
    /// Faults applied on this tick (at most one).
    #[serde(default)]
    pub active_faults: BTreeSet<FaultKind>,
}

impl EngineState {
    /// Cold-start state at the given ambient temperature.
    pub fn initial(ambient_c: f64, max_rpm: f64) -> Self {
        Self {
            tick: 0,
            elapsed_secs: 0.0,
            throttle: 0.0,
            rpm: 900.0,
            coolant_temp_c: 75.0_f64.max(ambient_c),
            coolant_sensor_offset_c: 0.0,
            oil_temp_c: 80.0_f64.max(ambient_c),
            oil_pressure_kpa: 120.0,
            oil_health: 1.0,
            rpm_ceiling: max_rpm,
            fan_on: false,
            protective_derate: false,
            active_faults: BTreeSet::new(),
        }
    }

    pub fn has_fault(&self, kind: FaultKind) -> bool {
        self.active_faults.contains(&kind)
    }

    /// Derate from either an injected fault or the protective latch.
    pub fn derate_engaged(&self) -> bool {
        self.protective_derate || self.has_fault(FaultKind::Derate)
    }

    /// Coolant temperature as the sensor reports it, clamped to the sensor range.
    pub fn coolant_reading_c(&self) -> f64 {
        (self.coolant_temp_c + self.coolant_sensor_offset_c).clamp(TEMP_MIN_C, TEMP_MAX_C)
    }

    /// Check every float is finite and inside the physical envelope.
    pub fn is_within_envelope(&self) -> bool {
        let temps_ok = [self.coolant_temp_c, self.oil_temp_c]
            .iter()
            .all(|t| t.is_finite() && (TEMP_MIN_C..=TEMP_MAX_C).contains(t));

        temps_ok
            && self.rpm.is_finite()
            && (0.0..=RPM_MAX).contains(&self.rpm)
            && self.oil_pressure_kpa.is_finite()
            && (0.0..=PRESSURE_MAX_KPA).contains(&self.oil_pressure_kpa)
            && (0.0..=1.0).contains(&self.oil_health)
            && (0.0..=1.0).contains(&self.throttle)
            && self.coolant_sensor_offset_c.is_finite()
    }
}
