//! E2E tests for DTC lifecycles and edge-triggered events.

mod helpers;

use std::collections::BTreeMap;

use ecu_protocol::event::{DERATE_OFF, DERATE_ON, FAN_OFF, FAN_ON, OVERSPEED, OVERSPEED_CLEAR};
use ecu_protocol::{DiagnosticRecord, DtcStatus};
use helpers::{RunOutput, run, seeded};

fn dtc_history(out: &RunOutput) -> BTreeMap<String, Vec<(DtcStatus, u32)>> {
    let mut history: BTreeMap<String, Vec<(DtcStatus, u32)>> = BTreeMap::new();
    for record in out.records() {
        if let DiagnosticRecord::Dtc(d) = record {
            history
                .entry(d.code.clone())
                .or_default()
                .push((d.status, d.occurrence));
        }
    }
    history
}

/// Each code alternates set/cleared and numbers its occurrences 1, 2, 3...
#[tokio::test]
async fn e2e_dtc_set_once_per_occurrence() {
    let out = run(seeded(77, 300.0, 0.3)).await;
    let history = dtc_history(&out);
    assert!(!history.is_empty(), "fault-heavy run should raise DTCs");

    for (code, entries) in &history {
        for (i, (status, occurrence)) in entries.iter().enumerate() {
            let expected_status = if i % 2 == 0 {
                DtcStatus::Active
            } else {
                DtcStatus::Cleared
            };
            assert_eq!(*status, expected_status, "{code} entry {i}");
            assert_eq!(*occurrence as usize, i / 2 + 1, "{code} entry {i}");
        }
    }
}

/// Summary counters agree with the emitted records.
#[tokio::test]
async fn e2e_summary_matches_records() {
    let out = run(seeded(78, 200.0, 0.3)).await;
    let records = out.records();

    let set = records
        .iter()
        .filter(|r| matches!(r, DiagnosticRecord::Dtc(d) if d.status == DtcStatus::Active))
        .count();
    let events = records.iter().filter(|r| r.as_event().is_some()).count();

    assert_eq!(out.summary.dtcs_set, set);
    assert_eq!(out.summary.events, events);
    assert_eq!(out.summary.fallbacks, 0);
}

/// Paired events alternate and never repeat back to back.
#[tokio::test]
async fn e2e_edge_events_alternate() {
    let out = run(seeded(11, 600.0, 0.2)).await;
    let codes = out.codes();

    for (on, off) in [(FAN_ON, FAN_OFF), (DERATE_ON, DERATE_OFF), (OVERSPEED, OVERSPEED_CLEAR)] {
        let pair: Vec<&str> = codes
            .iter()
            .map(String::as_str)
            .filter(|c| *c == on || *c == off)
            .collect();
        for (i, code) in pair.iter().enumerate() {
            let expected = if i % 2 == 0 { on } else { off };
            assert_eq!(*code, expected, "{on}/{off} sequence: {pair:?}");
        }
    }
}

/// Fan events agree with the fan flag in the state log.
#[tokio::test]
async fn e2e_fan_events_track_fan_state() {
    let out = run(seeded(12, 600.0, 0.1)).await;

    let mut toggles = 0;
    let mut prev = false;
    for s in out.states() {
        if s.fan_on != prev {
            toggles += 1;
        }
        prev = s.fan_on;
    }

    let fan_events = out
        .codes()
        .iter()
        .filter(|c| c.as_str() == FAN_ON || c.as_str() == FAN_OFF)
        .count();
    assert_eq!(fan_events, toggles);
}

/// A fault on every tick surfaces as fault events and fault-present DTCs.
#[tokio::test]
async fn e2e_constant_faults_raise_dtcs() {
    let out = run(seeded(13, 50.0, 1.0)).await;

    assert!(out.states().iter().all(|s| !s.active_faults.is_empty()));
    assert!(out.codes().iter().any(|c| c.starts_with("FAULT_")));
    assert!(out.summary.dtcs_set > 0);
}

/// Records are emitted in tick order.
#[tokio::test]
async fn e2e_records_in_tick_order() {
    let out = run(seeded(14, 100.0, 0.3)).await;
    let ticks: Vec<u64> = out.records().iter().map(|r| r.tick()).collect();
    assert!(ticks.windows(2).all(|w| w[0] <= w[1]));
    assert!(ticks.iter().all(|t| (1..=out.summary.ticks).contains(t)));
}
