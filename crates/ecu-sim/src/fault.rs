//! Stochastic fault injection.
//!
//! Each tick draws one uniform sample; below `fault_rate` a fault is picked
//! from `FAULT_WEIGHTS`. The injector owns its RNG so a seeded run replays
//! the same fault sequence regardless of what else consumes randomness.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ecu_protocol::FaultKind;

/// Relative selection weights once a tick has been chosen to fault.
pub const FAULT_WEIGHTS: [(FaultKind, u32); 7] = [
    (FaultKind::Derate, 2),
    (FaultKind::OverTemp, 2),
    (FaultKind::PressureSpike, 2),
    (FaultKind::PressureDrop, 1),
    (FaultKind::FanStuckOn, 1),
    (FaultKind::FanStuckOff, 1),
    (FaultKind::SensorGlitch, 1),
];

/// RNG stream feeding fault decisions.
pub const FAULT_STREAM: u64 = 0;

/// RNG stream feeding engine model noise.
pub const NOISE_STREAM: u64 = 1;

/// Build an RNG for one stream. Seeded runs are reproducible; unseeded runs
/// draw from OS entropy.
pub fn stream_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_entropy(),
    }
}

/// Build the weighted chooser over `FAULT_WEIGHTS`.
pub fn fault_chooser() -> WeightedIndex<u32> {
    // Weights are static and all non-zero.
    WeightedIndex::new(FAULT_WEIGHTS.iter().map(|(_, w)| *w))
        .expect("FAULT_WEIGHTS contains non-zero weights")
}

/// Decide this tick's fault. Only side effect: advances `rng`.
pub fn decide<R: Rng + ?Sized>(
    rng: &mut R,
    fault_rate: f64,
    chooser: &WeightedIndex<u32>,
) -> Option<FaultKind> {
    let sample: f64 = rng.r#gen();
    if sample < fault_rate {
        Some(FAULT_WEIGHTS[chooser.sample(rng)].0)
    } else {
        None
    }
}

/// Per-run fault injector.
pub struct FaultInjector {
    rng: StdRng,
    fault_rate: f64,
    chooser: WeightedIndex<u32>,
}

impl FaultInjector {
    pub fn new(seed: Option<u64>, fault_rate: f64) -> Self {
        Self {
            rng: stream_rng(seed, FAULT_STREAM),
            fault_rate,
            chooser: fault_chooser(),
        }
    }

    pub fn fault_rate(&self) -> f64 {
        self.fault_rate
    }

    /// Decide the fault for `tick`.
    pub fn next(&mut self, tick: u64, elapsed_secs: f64) -> Option<FaultKind> {
        let fault = decide(&mut self.rng, self.fault_rate, &self.chooser);
        if let Some(kind) = fault {
            tracing::debug!(tick, elapsed_secs, fault = %kind, "fault injected");
        }
        fault
    }
}
