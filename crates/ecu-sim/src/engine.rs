//! Engine physics model.
//!
//! `EngineModel::advance` is a pure step function: previous state, tick
//! interval, this tick's fault and pre-drawn noise in; new state out.
//! All randomness is drawn by `NoiseSource` before the call.

use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

use ecu_protocol::{EngineState, FaultKind, PRESSURE_MAX_KPA, RPM_MAX, TEMP_MAX_C, TEMP_MIN_C};

use crate::error::{SimError, SimResult};
use crate::fault::{NOISE_STREAM, stream_rng};

/// Largest magnitude of per-tick oil pressure sensor noise, in kPa.
pub const PRESSURE_NOISE_EPSILON_KPA: f64 = 2.0;

const PRESSURE_NOISE_SIGMA_KPA: f64 = 0.7;

/// Tunable engine constants. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub idle_rpm: f64,
    pub max_rpm: f64,
    pub redline_rpm: f64,
    pub ambient_c: f64,
    /// RPM first-order lag, seconds.
    pub rpm_time_constant: f64,
    /// Radiator loss time constant, seconds.
    pub thermal_time_constant: f64,
    pub fan_on_temp_c: f64,
    pub fan_off_temp_c: f64,
    pub fan_cooling_power: f64,
    /// Fastest allowed coolant drop, °C/s.
    pub max_coolant_cool_rate: f64,
    /// Oil heat input per rpm, °C/s.
    pub oil_heat_per_rpm: f64,
    /// Oil-to-coolant exchange time constant, seconds.
    pub oil_cooler_time_constant: f64,
    pub oil_health_decay_rate: f64,
    pub pressure_time_constant: f64,
    /// Oil temperature that latches the protective derate.
    pub derate_temp_c: f64,
    /// Hysteresis below `derate_temp_c` before the latch releases.
    pub derate_release_margin_c: f64,
    /// Throttle and ceiling multiplier while derated.
    pub derate_factor: f64,
    /// Ceiling ramp speed, rpm/s.
    pub derate_ramp_rate: f64,
    /// RPM clamp applied by an injected `Derate` fault.
    pub derate_fault_ceiling_rpm: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            idle_rpm: 800.0,
            max_rpm: 7000.0,
            redline_rpm: 6500.0,
            ambient_c: 25.0,
            rpm_time_constant: 1.5,
            thermal_time_constant: 40.0,
            fan_on_temp_c: 100.0,
            fan_off_temp_c: 95.0,
            fan_cooling_power: 9.0,
            max_coolant_cool_rate: 1.5,
            oil_heat_per_rpm: 0.0004,
            oil_cooler_time_constant: 20.0,
            oil_health_decay_rate: 0.0015,
            pressure_time_constant: 0.6,
            derate_temp_c: 120.0,
            derate_release_margin_c: 3.0,
            derate_factor: 0.5,
            derate_ramp_rate: 500.0,
            derate_fault_ceiling_rpm: 3000.0,
        }
    }
}

// ── Noise ───────────────────────────────────────────────────────

/// Random inputs consumed by one `advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickNoise {
    /// Driver throttle wobble, ±0.05.
    pub throttle_jitter: f64,
    /// Combustion heat wobble, ±0.1 °C/s.
    pub heat: f64,
    /// Oil pressure sensor noise, within ±`PRESSURE_NOISE_EPSILON_KPA`.
    pub pressure_kpa: f64,
    /// Fault severity, 0.0 – 1.0.
    pub fault_magnitude: f64,
    /// Direction of a sensor glitch, ±1.0.
    pub glitch_sign: f64,
}

impl TickNoise {
    /// Noise-free input with a mid-scale fault magnitude.
    pub fn zero() -> Self {
        Self {
            fault_magnitude: 0.5,
            glitch_sign: 1.0,
            ..Default::default()
        }
    }
}

/// Seeded source of `TickNoise`.
pub struct NoiseSource {
    rng: StdRng,
    pressure: Normal<f64>,
}

impl NoiseSource {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: stream_rng(seed, NOISE_STREAM),
            pressure: Normal::new(0.0, PRESSURE_NOISE_SIGMA_KPA)
                .expect("pressure noise sigma is positive"),
        }
    }

    pub fn next(&mut self) -> TickNoise {
        let pressure_kpa = self
            .pressure
            .sample(&mut self.rng)
            .clamp(-PRESSURE_NOISE_EPSILON_KPA, PRESSURE_NOISE_EPSILON_KPA);
        TickNoise {
            throttle_jitter: self.rng.gen_range(-0.05..=0.05),
            heat: self.rng.gen_range(-0.1..=0.1),
            pressure_kpa,
            fault_magnitude: self.rng.gen_range(0.0..=1.0),
            glitch_sign: if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 },
        }
    }
}

// ── Model ───────────────────────────────────────────────────────

/// Single-cylinder-equivalent engine model.
#[derive(Debug, Clone, Default)]
pub struct EngineModel {
    params: EngineParams,
}

impl EngineModel {
    pub fn new(params: EngineParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Cold-start state for this engine.
    pub fn initial_state(&self) -> EngineState {
        EngineState::initial(self.params.ambient_c, self.params.max_rpm)
    }

    /// Driver demand at simulated time `t`: a slow sine around 40 %.
    pub fn throttle_at(&self, t: f64, jitter: f64) -> f64 {
        (0.4 + 0.35 * (t / 6.0).sin() + jitter).clamp(0.0, 1.0)
    }

    /// Advance `prev` by `dt` seconds under `fault`.
    pub fn advance(
        &self,
        prev: &EngineState,
        dt: f64,
        fault: Option<FaultKind>,
        noise: &TickNoise,
    ) -> SimResult<EngineState> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidInterval { dt });
        }
        let p = &self.params;
        let max_rpm = p.max_rpm.max(1.0);

        // RPM
        let throttle = self.throttle_at(prev.elapsed_secs, noise.throttle_jitter);
        let effective_throttle = if prev.protective_derate {
            throttle * p.derate_factor
        } else {
            throttle
        };
        let span = (prev.rpm_ceiling - p.idle_rpm).max(0.0);
        let mut target_rpm = p.idle_rpm + effective_throttle.powf(0.85) * span;
        if target_rpm > p.redline_rpm {
            // soft limiter
            target_rpm = p.redline_rpm + (target_rpm - p.redline_rpm) * 0.25;
        }
        let mut rpm = prev.rpm + (target_rpm - prev.rpm) * lag(dt, p.rpm_time_constant);
        rpm = rpm.min(p.redline_rpm + 100.0);
        if fault == Some(FaultKind::Derate) {
            rpm = rpm.min(p.derate_fault_ceiling_rpm);
        }
        let rpm_frac = (rpm / max_rpm).clamp(0.0, 1.0);

        // Fan
        let thermostat = if prev.fan_on {
            !(prev.coolant_temp_c < p.fan_off_temp_c && prev.oil_temp_c < p.fan_off_temp_c)
        } else {
            prev.coolant_temp_c > p.fan_on_temp_c || prev.oil_temp_c > p.fan_on_temp_c
        };
        let fan_on = match fault {
            Some(FaultKind::FanStuckOn) => true,
            Some(FaultKind::FanStuckOff) => false,
            _ => thermostat,
        };

        // Coolant
        let heat = (0.9 * throttle + 0.3 * rpm_frac) * 10.0 + noise.heat;
        let radiator = (prev.coolant_temp_c - p.ambient_c) / p.thermal_time_constant.max(1.0);
        let fan_cooling = if fan_on {
            p.fan_cooling_power * (0.5 + 0.5 * rpm_frac)
        } else {
            0.0
        };
        let oil_to_coolant = 0.1 * (prev.oil_temp_c - prev.coolant_temp_c);
        let coolant_delta = ((heat - radiator - fan_cooling + oil_to_coolant) * dt)
            .max(-p.max_coolant_cool_rate * dt);
        let mut coolant = (prev.coolant_temp_c + coolant_delta).max(p.ambient_c);
        if fault == Some(FaultKind::OverTemp) {
            coolant += 4.0 + 4.0 * noise.fault_magnitude;
        }
        // A glitch corrupts the reading only; the next tick integrates from `coolant`.
        let coolant_sensor_offset_c = if fault == Some(FaultKind::SensorGlitch) {
            noise.glitch_sign * 15.0 * noise.fault_magnitude
        } else {
            0.0
        };

        // Oil temperature
        let oil_heat = p.oil_heat_per_rpm * rpm;
        let oil_cooling = (prev.oil_temp_c - prev.coolant_temp_c)
            / p.oil_cooler_time_constant.max(1.0)
            + (prev.oil_temp_c - p.ambient_c) / 200.0;
        let oil_temp = prev.oil_temp_c + (oil_heat - oil_cooling) * dt;

        // Oil health
        let mut oil_health = prev.oil_health;
        if oil_temp > 100.0 {
            let mut decay = p.oil_health_decay_rate * (oil_temp - 90.0) * dt;
            if oil_temp > 115.0 {
                decay += ((oil_temp - 115.0) / 8.0).exp() * 0.002 * dt;
            }
            oil_health = (oil_health - decay).max(0.0);
        }

        // Oil pressure
        let pump_flow = rpm_frac * oil_health;
        let temp_factor = (1.0 - (oil_temp - 90.0) / 200.0).max(0.4);
        let target_pressure = (120.0 + 350.0 * rpm_frac.powf(0.9) * pump_flow) * temp_factor;
        let alpha_p = lag(dt, p.pressure_time_constant);
        let mut pressure =
            prev.oil_pressure_kpa * (1.0 - alpha_p) + target_pressure * alpha_p + noise.pressure_kpa;
        match fault {
            Some(FaultKind::PressureSpike) => pressure += 60.0 + 60.0 * noise.fault_magnitude,
            Some(FaultKind::PressureDrop) => pressure *= 0.5 - 0.2 * noise.fault_magnitude,
            _ => {}
        }

        // Protective derate
        let protective_derate = if prev.protective_derate {
            oil_temp >= p.derate_temp_c - p.derate_release_margin_c
        } else {
            oil_temp >= p.derate_temp_c
        };
        let ramp = p.derate_ramp_rate * dt;
        let rpm_ceiling = if protective_derate {
            let floor = (p.max_rpm * p.derate_factor).max(1500.0);
            (prev.rpm_ceiling - ramp).max(floor).min(prev.rpm_ceiling)
        } else {
            (prev.rpm_ceiling + ramp).min(p.max_rpm)
        };

        let next = EngineState {
            tick: prev.tick + 1,
            elapsed_secs: prev.elapsed_secs + dt,
            throttle,
            rpm,
            coolant_temp_c: coolant,
            coolant_sensor_offset_c,
            oil_temp_c: oil_temp,
            oil_pressure_kpa: pressure,
            oil_health,
            rpm_ceiling,
            fan_on,
            protective_derate,
            active_faults: fault.into_iter().collect(),
        };
        Ok(clamp_envelope(next, prev))
    }
}

/// Discrete first-order lag coefficient.
fn lag(dt: f64, time_constant: f64) -> f64 {
    1.0 - (-dt / time_constant.max(1e-6)).exp()
}

/// Terminal guard: force every field into the physical envelope. Non-finite
/// values fall back to the previous tick.
fn clamp_envelope(mut state: EngineState, prev: &EngineState) -> EngineState {
    state.rpm = guard(state.rpm, prev.rpm, 0.0, RPM_MAX);
    state.coolant_temp_c = guard(state.coolant_temp_c, prev.coolant_temp_c, TEMP_MIN_C, TEMP_MAX_C);
    state.oil_temp_c = guard(state.oil_temp_c, prev.oil_temp_c, TEMP_MIN_C, TEMP_MAX_C);
    state.oil_pressure_kpa = guard(state.oil_pressure_kpa, prev.oil_pressure_kpa, 0.0, PRESSURE_MAX_KPA);
    state.oil_health = guard(state.oil_health, prev.oil_health, 0.0, 1.0);
    if !state.coolant_sensor_offset_c.is_finite() {
        state.coolant_sensor_offset_c = 0.0;
    }
    state.throttle = guard(state.throttle, prev.throttle, 0.0, 1.0);
    state.rpm_ceiling = guard(state.rpm_ceiling, prev.rpm_ceiling, 0.0, RPM_MAX);
    state
}

fn guard(value: f64, fallback: f64, lo: f64, hi: f64) -> f64 {
    let value = if value.is_finite() { value } else { fallback };
    if value.is_finite() { value.clamp(lo, hi) } else { lo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultInjector;

    fn model() -> EngineModel {
        EngineModel::default()
    }

    fn run(model: &EngineModel, mut state: EngineState, ticks: usize) -> EngineState {
        for _ in 0..ticks {
            state = model.advance(&state, 0.5, None, &TickNoise::zero()).unwrap();
        }
        state
    }

    #[test]
    fn rejects_non_positive_interval() {
        let m = model();
        let s = m.initial_state();
        for dt in [0.0, -0.5, f64::NAN, f64::INFINITY] {
            let result = m.advance(&s, dt, None, &TickNoise::zero());
            assert!(matches!(result, Err(SimError::InvalidInterval { .. })), "dt = {dt}");
        }
    }

    #[test]
    fn advances_tick_and_time() {
        let m = model();
        let s0 = m.initial_state();
        let s1 = m.advance(&s0, 0.5, None, &TickNoise::zero()).unwrap();
        assert_eq!(s1.tick, 1);
        assert_eq!(s1.elapsed_secs, 0.5);
        assert_eq!(s0.tick, 0);
        assert!(s1.active_faults.is_empty());
    }

    #[test]
    fn rpm_settles_between_idle_and_redline() {
        let m = model();
        let s = run(&m, m.initial_state(), 40);
        assert!(s.rpm > m.params().idle_rpm);
        assert!(s.rpm < m.params().redline_rpm);
    }

    #[test]
    fn derate_fault_clamps_rpm() {
        let m = model();
        let mut s = m.initial_state();
        s.rpm = 5500.0;
        let next = m
            .advance(&s, 0.5, Some(FaultKind::Derate), &TickNoise::zero())
            .unwrap();
        assert!(next.rpm <= 3000.0);
        assert!(next.has_fault(FaultKind::Derate));
        assert!(next.derate_engaged());
    }

    #[test]
    fn rpm_hard_limited_above_redline() {
        let m = model();
        let mut s = m.initial_state();
        s.rpm = 7900.0;
        let next = m.advance(&s, 0.5, None, &TickNoise::zero()).unwrap();
        assert!(next.rpm <= m.params().redline_rpm + 100.0);
    }

    #[test]
    fn fan_thermostat_hysteresis() {
        let m = model();
        let mut s = m.initial_state();
        s.coolant_temp_c = 101.0;
        let on = m.advance(&s, 0.5, None, &TickNoise::zero()).unwrap();
        assert!(on.fan_on);

        // Between off and on thresholds: stays on.
        let mut warm = on.clone();
        warm.coolant_temp_c = 97.0;
        warm.oil_temp_c = 90.0;
        assert!(m.advance(&warm, 0.5, None, &TickNoise::zero()).unwrap().fan_on);

        // Both below off threshold: turns off.
        let mut cool = on;
        cool.coolant_temp_c = 94.0;
        cool.oil_temp_c = 94.0;
        assert!(!m.advance(&cool, 0.5, None, &TickNoise::zero()).unwrap().fan_on);
    }

    #[test]
    fn fan_faults_override_thermostat() {
        let m = model();
        let cold = m.initial_state();
        let stuck_on = m
            .advance(&cold, 0.5, Some(FaultKind::FanStuckOn), &TickNoise::zero())
            .unwrap();
        assert!(stuck_on.fan_on);

        let mut hot = m.initial_state();
        hot.coolant_temp_c = 110.0;
        let stuck_off = m
            .advance(&hot, 0.5, Some(FaultKind::FanStuckOff), &TickNoise::zero())
            .unwrap();
        assert!(!stuck_off.fan_on);
    }

    #[test]
    fn pressure_spike_raises_pressure() {
        let m = model();
        let s = m.initial_state();
        let normal = m.advance(&s, 0.5, None, &TickNoise::zero()).unwrap();
        let spiked = m
            .advance(&s, 0.5, Some(FaultKind::PressureSpike), &TickNoise::zero())
            .unwrap();
        assert!(spiked.oil_pressure_kpa >= normal.oil_pressure_kpa + 60.0);
    }

    #[test]
    fn pressure_drop_stays_non_negative() {
        let m = model();
        let mut s = m.initial_state();
        for _ in 0..50 {
            s = m
                .advance(&s, 0.5, Some(FaultKind::PressureDrop), &TickNoise::zero())
                .unwrap();
            assert!(s.oil_pressure_kpa >= 0.0);
        }
        assert!(s.oil_pressure_kpa < 100.0);
    }

    #[test]
    fn over_temp_fault_heats_coolant() {
        let m = model();
        let s = m.initial_state();
        let normal = m.advance(&s, 0.5, None, &TickNoise::zero()).unwrap();
        let hot = m
            .advance(&s, 0.5, Some(FaultKind::OverTemp), &TickNoise::zero())
            .unwrap();
        assert!(hot.coolant_temp_c >= normal.coolant_temp_c + 4.0);
    }

    #[test]
    fn sensor_glitch_only_offsets_reading() {
        let m = model();
        let s0 = m.initial_state();
        let noise = TickNoise {
            fault_magnitude: 1.0,
            glitch_sign: -1.0,
            ..TickNoise::zero()
        };

        let clean1 = m.advance(&s0, 0.5, None, &TickNoise::zero()).unwrap();
        let glitch1 = m
            .advance(&s0, 0.5, Some(FaultKind::SensorGlitch), &noise)
            .unwrap();
        assert_eq!(glitch1.coolant_temp_c, clean1.coolant_temp_c);
        assert_eq!(glitch1.coolant_sensor_offset_c, -15.0);
        assert!((glitch1.coolant_reading_c() - (clean1.coolant_temp_c - 15.0)).abs() < 1e-9);

        // One tick later the glitch leaves no trace.
        let clean2 = m.advance(&clean1, 0.5, None, &TickNoise::zero()).unwrap();
        let after = m.advance(&glitch1, 0.5, None, &TickNoise::zero()).unwrap();
        assert_eq!(after.coolant_temp_c, clean2.coolant_temp_c);
        assert_eq!(after.coolant_sensor_offset_c, 0.0);
        assert_eq!(after.coolant_reading_c(), clean2.coolant_reading_c());
    }

    #[test]
    fn protective_derate_latches_and_ramps_ceiling() {
        let m = model();
        let mut s = m.initial_state();
        s.oil_temp_c = 124.0;
        s.coolant_temp_c = 100.0;
        let next = m.advance(&s, 0.5, None, &TickNoise::zero()).unwrap();
        assert!(next.protective_derate);
        assert_eq!(next.rpm_ceiling, 7000.0 - 250.0);

        // Ceiling never drops below the derate floor.
        let mut latched = next;
        latched.rpm_ceiling = 3500.0;
        latched.oil_temp_c = 124.0;
        let floored = m.advance(&latched, 0.5, None, &TickNoise::zero()).unwrap();
        assert_eq!(floored.rpm_ceiling, 3500.0);
    }

    #[test]
    fn protective_derate_releases_with_hysteresis() {
        let m = model();
        let mut s = m.initial_state();
        s.protective_derate = true;
        s.rpm_ceiling = 3500.0;
        s.oil_temp_c = 110.0;
        s.coolant_temp_c = 90.0;
        let next = m.advance(&s, 0.5, None, &TickNoise::zero()).unwrap();
        assert!(!next.protective_derate);
        assert_eq!(next.rpm_ceiling, 3750.0);
    }

    #[test]
    fn random_faults_never_leave_envelope() {
        let m = model();
        let mut injector = FaultInjector::new(Some(1234), 0.6);
        let mut noise = NoiseSource::new(Some(1234));
        let mut s = m.initial_state();
        for _ in 0..5000 {
            let fault = injector.next(s.tick, s.elapsed_secs);
            s = m.advance(&s, 0.5, fault, &noise.next()).unwrap();
            assert!(s.is_within_envelope(), "out of envelope at tick {}: {s:?}", s.tick);
        }
    }

    #[test]
    fn noise_is_bounded() {
        let mut source = NoiseSource::new(Some(9));
        for _ in 0..2000 {
            let n = source.next();
            assert!(n.pressure_kpa.abs() <= PRESSURE_NOISE_EPSILON_KPA);
            assert!(n.throttle_jitter.abs() <= 0.05);
            assert!((0.0..=1.0).contains(&n.fault_magnitude));
            assert!(n.glitch_sign == 1.0 || n.glitch_sign == -1.0);
        }
    }
}
