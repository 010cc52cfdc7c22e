//! E2E tests for physical bounds over long, fault-heavy runs.

mod helpers;

use ecu_protocol::{PRESSURE_MAX_KPA, RPM_MAX, TEMP_MAX_C, TEMP_MIN_C};
use helpers::{run, seeded};

/// Every emitted state stays inside the physical envelope.
#[tokio::test]
async fn e2e_states_stay_within_envelope() {
    for seed in [3, 17, 101] {
        let out = run(seeded(seed, 1000.0, 0.5)).await;
        assert_eq!(out.summary.ticks, 2000);

        for s in out.states() {
            assert!(s.is_within_envelope(), "seed {seed} tick {}: {s:?}", s.tick);
            assert!((0.0..=RPM_MAX).contains(&s.rpm));
            assert!((0.0..=PRESSURE_MAX_KPA).contains(&s.oil_pressure_kpa));
            assert!((TEMP_MIN_C..=TEMP_MAX_C).contains(&s.coolant_temp_c));
            assert!((TEMP_MIN_C..=TEMP_MAX_C).contains(&s.oil_temp_c));
            assert!((0.0..=1.0).contains(&s.oil_health));
        }
    }
}

/// Ticks are contiguous and elapsed time strictly increases.
#[tokio::test]
async fn e2e_ticks_are_contiguous() {
    let out = run(seeded(5, 100.0, 0.1)).await;
    let states = out.states();

    for (i, s) in states.iter().enumerate() {
        assert_eq!(s.tick, i as u64 + 1);
    }
    for pair in states.windows(2) {
        assert!(pair[1].elapsed_secs > pair[0].elapsed_secs);
    }
}
