//! DTC and event derivation.
//!
//! Each DTC code runs a small debounced state machine:
//!
//! ```text
//! Inactive --(predicate true for activate_after ticks)--> Active
//! Active   --(predicate false for clear_after ticks)----> Cleared (= Inactive)
//! ```
//!
//! A cleared occurrence never reopens; a later trigger starts occurrence n+1.
//! Limits are strict: `value > high_limit` or `value < low_limit` triggers,
//! a value exactly on the limit does not.
//!
//! Events are edge-triggered on their boolean condition and fire once per
//! transition.

use std::collections::BTreeMap;

use serde::Deserialize;

use ecu_protocol::event::{
    DERATE_OFF, DERATE_ON, FAN_OFF, FAN_ON, OVERSPEED, OVERSPEED_CLEAR, PRESSURE_SPIKE,
};
use ecu_protocol::{
    DiagnosticRecord, DtcRecord, DtcSeverity, DtcStatus, EngineState, EventRecord, FaultKind,
};

/// Diagnostic limits and debounce windows. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiagnosticThresholds {
    /// P0217 sets above this coolant temperature.
    pub coolant_over_temp_c: f64,
    /// P0524 sets below this oil pressure.
    pub oil_pressure_low_kpa: f64,
    /// P0523 and the `PRESSURE_SPIKE` event fire above this oil pressure.
    pub oil_pressure_high_kpa: f64,
    /// P0196 sets above this oil temperature.
    pub critical_oil_temp_c: f64,
    /// Overspeed when rpm exceeds redline by more than this.
    pub overspeed_margin_rpm: f64,
    /// Overspeed clears once rpm is this far below redline.
    pub overspeed_clear_margin_rpm: f64,
    /// Consecutive ticks a debounced threshold must hold before setting.
    pub activate_ticks: u32,
    /// Consecutive healthy ticks before an active code clears.
    pub clear_ticks: u32,
}

impl Default for DiagnosticThresholds {
    fn default() -> Self {
        Self {
            coolant_over_temp_c: 110.0,
            oil_pressure_low_kpa: 100.0,
            oil_pressure_high_kpa: 320.0,
            critical_oil_temp_c: 125.0,
            overspeed_margin_rpm: 50.0,
            overspeed_clear_margin_rpm: 100.0,
            activate_ticks: 3,
            clear_ticks: 5,
        }
    }
}

// ── Rule tables ─────────────────────────────────────────────────

/// Predicate behind a DTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    CoolantOverTemp,
    OilPressureLow,
    OilPressureHigh,
    Overspeed,
    OilOverTemp,
    DerateEngaged,
    FanFault,
    SensorGlitch,
}

/// Static definition of one DTC.
#[derive(Debug, Clone, Copy)]
pub struct DtcRule {
    pub code: &'static str,
    pub description: &'static str,
    pub severity: DtcSeverity,
    pub condition: Condition,
    /// Use the `activate_ticks` window; otherwise sets on the first tick.
    pub debounced: bool,
}

pub const DTC_RULES: &[DtcRule] = &[
    DtcRule {
        code: "P0217",
        description: "Engine Coolant Over Temperature Condition",
        severity: DtcSeverity::Critical,
        condition: Condition::CoolantOverTemp,
        debounced: true,
    },
    DtcRule {
        code: "P0524",
        description: "Engine Oil Pressure Too Low",
        severity: DtcSeverity::Critical,
        condition: Condition::OilPressureLow,
        debounced: true,
    },
    DtcRule {
        code: "P0523",
        description: "Engine Oil Pressure Sensor/Switch High Voltage",
        severity: DtcSeverity::Warning,
        condition: Condition::OilPressureHigh,
        debounced: false,
    },
    DtcRule {
        code: "P0219",
        description: "Engine Overspeed Condition",
        severity: DtcSeverity::Warning,
        condition: Condition::Overspeed,
        debounced: false,
    },
    DtcRule {
        code: "P0196",
        description: "Engine Oil Temperature Sensor Range/Performance",
        severity: DtcSeverity::Critical,
        condition: Condition::OilOverTemp,
        debounced: false,
    },
    DtcRule {
        code: "P1250",
        description: "Engine Power Derate Active",
        severity: DtcSeverity::Warning,
        condition: Condition::DerateEngaged,
        debounced: false,
    },
    DtcRule {
        code: "P0480",
        description: "Cooling Fan 1 Control Circuit Malfunction",
        severity: DtcSeverity::Warning,
        condition: Condition::FanFault,
        debounced: false,
    },
    DtcRule {
        code: "P0116",
        description: "Engine Coolant Temperature Circuit Range/Performance",
        severity: DtcSeverity::Info,
        condition: Condition::SensorGlitch,
        debounced: false,
    },
];

/// Boolean watched for edge-triggered events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Fan,
    Derate,
    PressureSpike,
    Overspeed,
    Fault(FaultKind),
}

#[derive(Debug, Clone, Copy)]
struct EdgeWatcher {
    signal: Signal,
    /// Fires on false → true. Also the key in `DiagnosticState::edges`.
    rising: &'static str,
    /// Fires on true → false, when the pair is tracked.
    falling: Option<&'static str>,
}

const EDGE_WATCHERS: &[EdgeWatcher] = &[
    EdgeWatcher { signal: Signal::Fan, rising: FAN_ON, falling: Some(FAN_OFF) },
    EdgeWatcher { signal: Signal::Derate, rising: DERATE_ON, falling: Some(DERATE_OFF) },
    EdgeWatcher { signal: Signal::PressureSpike, rising: PRESSURE_SPIKE, falling: None },
    EdgeWatcher { signal: Signal::Overspeed, rising: OVERSPEED, falling: Some(OVERSPEED_CLEAR) },
];

/// Physical watchers followed by one `FAULT_<KIND>` watcher per fault kind.
fn edge_watchers() -> impl Iterator<Item = EdgeWatcher> {
    let faults = FaultKind::ALL.into_iter().map(|kind| EdgeWatcher {
        signal: Signal::Fault(kind),
        rising: kind.event_code(),
        falling: None,
    });
    EDGE_WATCHERS.iter().copied().chain(faults)
}

// ── State ───────────────────────────────────────────────────────

/// Debounce record for one DTC code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DtcTracker {
    pub active: bool,
    /// Occurrences opened so far in this run.
    pub occurrences: u32,
    pub consecutive_true: u32,
    pub consecutive_false: u32,
    /// Tick the current occurrence was set, while active.
    pub since_tick: Option<u64>,
}

/// Everything the diagnostics engine carries between ticks.
///
/// Owned by the simulation loop and replaced wholesale each tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticState {
    pub dtcs: BTreeMap<&'static str, DtcTracker>,
    pub edges: BTreeMap<&'static str, bool>,
}

impl DiagnosticState {
    /// Codes currently active, in code order.
    pub fn active_codes(&self) -> Vec<&'static str> {
        self.dtcs
            .iter()
            .filter(|(_, t)| t.active)
            .map(|(code, _)| *code)
            .collect()
    }

    pub fn is_active(&self, code: &str) -> bool {
        self.dtcs.get(code).is_some_and(|t| t.active)
    }
}

// ── Engine ──────────────────────────────────────────────────────

/// Evaluates post-tick engine state against the rule tables.
#[derive(Debug, Clone)]
pub struct DiagnosticsEngine {
    thresholds: DiagnosticThresholds,
    redline_rpm: f64,
}

impl DiagnosticsEngine {
    pub fn new(thresholds: DiagnosticThresholds, redline_rpm: f64) -> Self {
        Self {
            thresholds,
            redline_rpm,
        }
    }

    pub fn thresholds(&self) -> &DiagnosticThresholds {
        &self.thresholds
    }

    /// Starting state with edge signals primed from the initial engine state,
    /// so nothing fires for conditions already true at start.
    pub fn initial_state(&self, engine: &EngineState) -> DiagnosticState {
        let mut state = DiagnosticState::default();
        for watcher in edge_watchers() {
            state
                .edges
                .insert(watcher.rising, self.signal(watcher.signal, engine, false));
        }
        state
    }

    /// Evaluate one tick. `prior` is left untouched.
    pub fn evaluate(
        &self,
        state: &EngineState,
        prior: &DiagnosticState,
    ) -> (DiagnosticState, Vec<DiagnosticRecord>) {
        let mut next = prior.clone();
        let mut records = Vec::new();

        for rule in DTC_RULES {
            let holds = self.holds(rule.condition, state);
            let activate_after = if rule.debounced {
                self.thresholds.activate_ticks.max(1)
            } else {
                1
            };
            let clear_after = self.thresholds.clear_ticks.max(1);

            let tracker = next.dtcs.entry(rule.code).or_default();
            if holds {
                tracker.consecutive_true = tracker.consecutive_true.saturating_add(1);
                tracker.consecutive_false = 0;
            } else {
                tracker.consecutive_false = tracker.consecutive_false.saturating_add(1);
                tracker.consecutive_true = 0;
            }

            if !tracker.active && tracker.consecutive_true >= activate_after {
                tracker.active = true;
                tracker.occurrences += 1;
                tracker.since_tick = Some(state.tick);
                tracing::warn!(
                    tick = state.tick,
                    code = rule.code,
                    occurrence = tracker.occurrences,
                    "DTC set"
                );
                records.push(dtc_record(rule, DtcStatus::Active, tracker.occurrences, state));
            } else if tracker.active && tracker.consecutive_false >= clear_after {
                tracker.active = false;
                tracker.since_tick = None;
                tracing::info!(
                    tick = state.tick,
                    code = rule.code,
                    occurrence = tracker.occurrences,
                    "DTC cleared"
                );
                records.push(dtc_record(rule, DtcStatus::Cleared, tracker.occurrences, state));
            }
        }

        for watcher in edge_watchers() {
            let was = prior.edges.get(watcher.rising).copied().unwrap_or(false);
            let now = self.signal(watcher.signal, state, was);

            let code = match (was, now) {
                (false, true) => Some(watcher.rising),
                (true, false) => watcher.falling,
                _ => None,
            };
            if let Some(code) = code {
                tracing::info!(tick = state.tick, code, "event");
                records.push(
                    EventRecord::new(code, state.tick, state.elapsed_secs, describe(code, state))
                        .into(),
                );
            }
            next.edges.insert(watcher.rising, now);
        }

        (next, records)
    }

    fn holds(&self, condition: Condition, s: &EngineState) -> bool {
        let t = &self.thresholds;
        match condition {
            Condition::CoolantOverTemp => s.coolant_reading_c() > t.coolant_over_temp_c,
            Condition::OilPressureLow => s.oil_pressure_kpa < t.oil_pressure_low_kpa,
            Condition::OilPressureHigh => s.oil_pressure_kpa > t.oil_pressure_high_kpa,
            Condition::Overspeed => s.rpm > self.redline_rpm + t.overspeed_margin_rpm,
            Condition::OilOverTemp => s.oil_temp_c > t.critical_oil_temp_c,
            Condition::DerateEngaged => s.derate_engaged(),
            Condition::FanFault => {
                s.has_fault(FaultKind::FanStuckOn) || s.has_fault(FaultKind::FanStuckOff)
            }
            Condition::SensorGlitch => s.has_fault(FaultKind::SensorGlitch),
        }
    }

    fn signal(&self, signal: Signal, s: &EngineState, was: bool) -> bool {
        let t = &self.thresholds;
        match signal {
            Signal::Fan => s.fan_on,
            Signal::Derate => s.derate_engaged(),
            Signal::PressureSpike => s.oil_pressure_kpa > t.oil_pressure_high_kpa,
            Signal::Overspeed if was => s.rpm >= self.redline_rpm - t.overspeed_clear_margin_rpm,
            Signal::Overspeed => s.rpm > self.redline_rpm + t.overspeed_margin_rpm,
            Signal::Fault(kind) => s.has_fault(kind),
        }
    }
}

fn dtc_record(rule: &DtcRule, status: DtcStatus, occurrence: u32, s: &EngineState) -> DiagnosticRecord {
    DtcRecord {
        code: rule.code.to_string(),
        description: rule.description.to_string(),
        severity: rule.severity,
        status,
        occurrence,
        tick: s.tick,
        elapsed_secs: s.elapsed_secs,
    }
    .into()
}

fn describe(code: &str, s: &EngineState) -> String {
    match code {
        FAN_ON => format!(
            "Fan turned ON at coolant {:.1}C oil {:.1}C",
            s.coolant_reading_c(), s.oil_temp_c
        ),
        FAN_OFF => format!(
            "Fan turned OFF at coolant {:.1}C oil {:.1}C",
            s.coolant_reading_c(), s.oil_temp_c
        ),
        DERATE_ON => format!("Derate engaged at OilTemp {:.1}C, RPM {:.1}", s.oil_temp_c, s.rpm),
        DERATE_OFF => format!("Derate released at OilTemp {:.1}C", s.oil_temp_c),
        PRESSURE_SPIKE => format!(
            "Pressure spike {:.1} kPa at RPM {:.1}",
            s.oil_pressure_kpa, s.rpm
        ),
        OVERSPEED => format!("RPM {:.1} exceeded redline", s.rpm),
        OVERSPEED_CLEAR => format!("RPM {:.1} returned below clear threshold", s.rpm),
        other => format!("{other} at RPM {:.1}", s.rpm),
    }
}
