//! Throttle strategies: total energy law, airspeed PID and manual pass-through.

use crate::config::TecsConfig;
use crate::energy::{EnergyRateLimits, SpecificEnergies};
use crate::estimator::SpeedEnvelope;
use crate::limits::ControlLimits;
use crate::pid::{IntegralForm, PidState};
use crate::stage::StagePolicy;
use cu29::prelude::*;

/// Empirical trim throttle as a function of true airspeed.
pub fn trim_throttle(tas: f32) -> f32 {
    0.1074 * tas + 0.114
}

/// State carried by the throttle axis between dispatch cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleState {
    pub throttle_dem: f32,
    pub last_throttle_dem: f32,
    pub integ_thr: f32,
    /// Total energy error of the last energy law run.
    pub ste_error: f32,
    ste_dot_err_last: f32,
    pub pid: PidState,
}

impl ThrottleState {
    pub fn reset(&mut self, cruise_throttle: f32) {
        self.integ_thr = 0.0;
        self.last_throttle_dem = cruise_throttle;
        self.ste_dot_err_last = 0.0;
        self.pid.reset();
    }
}

/// Everything a throttle law reads for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleInputs<'a> {
    pub now: CuTime,
    pub dt: f32,
    pub energies: &'a SpecificEnergies,
    pub rates: EnergyRateLimits,
    pub limits: ControlLimits,
    pub policy: StagePolicy,
    pub envelope: SpeedEnvelope,
    pub tas_state: f32,
    /// Clamped speed demand, the PID target.
    pub tas_dem: f32,
    pub cos_phi: f32,
    pub underspeed: bool,
    pub reached_speed_takeoff: bool,
    pub throttle_nudge_pct: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleLaw {
    Energy,
    Pid,
    Manual,
}

impl ThrottleLaw {
    /// Pick the law for this cycle. The PID wins when enabled, the energy law needs an
    /// airspeed, measured or synthetic.
    pub fn select(config: &TecsConfig, airspeed_sensor: bool, synthetic_once: bool) -> Self {
        if config.throttle_pid_enable {
            ThrottleLaw::Pid
        } else if ((airspeed_sensor || config.synthetic_airspeed) && !config.manual_throttle)
            || synthetic_once
        {
            ThrottleLaw::Energy
        } else {
            ThrottleLaw::Manual
        }
    }

    pub fn update(
        self,
        state: &mut ThrottleState,
        inputs: &ThrottleInputs,
        config: &TecsConfig,
    ) -> f32 {
        state.throttle_dem = match self {
            ThrottleLaw::Energy => energy_law(state, inputs, config),
            ThrottleLaw::Pid => pid_law(state, inputs, config),
            ThrottleLaw::Manual => inputs
                .limits
                .clamp_throttle(f32::from(inputs.throttle_nudge_pct) / 100.0),
        };
        state.throttle_dem
    }
}

fn energy_law(state: &mut ThrottleState, inputs: &ThrottleInputs, config: &TecsConfig) -> f32 {
    let e = inputs.energies;
    let limits = &inputs.limits;
    let rates = &inputs.rates;

    // Keep a large height error from asking for an unreachable airspeed.
    let (spe_err_min, spe_err_max) = if config.test_mode == 1 || inputs.policy.exclude_potential_energy
    {
        (0.0, 0.0)
    } else {
        (
            0.5 * inputs.envelope.tas_min * inputs.envelope.tas_min - e.ske_dem,
            0.5 * inputs.envelope.tas_max * inputs.envelope.tas_max - e.ske_dem,
        )
    };

    state.ste_error = e.spe_error().clamp(spe_err_min, spe_err_max) + e.ske_error();
    let mut ste_dot_dem =
        (e.spe_dot_dem + e.ske_dot_dem).clamp(rates.ste_dot_min, rates.ste_dot_max);
    let ste_dot_error = 0.2 * (ste_dot_dem - e.ste_dot()) + 0.8 * state.ste_dot_err_last;
    state.ste_dot_err_last = ste_dot_error;

    if inputs.underspeed {
        return limits.thr_max;
    }

    let k_ste2thr = 1.0 / (config.time_constant() * rates.range());

    // induced drag in turns
    let cos2 = (inputs.cos_phi * inputs.cos_phi).clamp(0.1, 1.0);
    ste_dot_dem += config.roll_comp * (1.0 / cos2 - 1.0);
    let ff_throttle = if config.test_mode == 1 {
        trim_throttle(inputs.tas_state)
    } else {
        config.cruise_throttle()
            + ste_dot_dem / rates.range() * (limits.thr_max - limits.thr_min)
    };

    let mut throttle = limits.clamp_throttle(
        (state.ste_error + ste_dot_error * config.thr_damp) * k_ste2thr + ff_throttle,
    );

    let thr_min_clipped = limits.thr_min_clipped();
    let slewrate = config.airframe.throttle_slewrate;
    if slewrate != 0.0 {
        let incr = (inputs.dt * (limits.thr_max - thr_min_clipped) * slewrate * 0.01).max(0.0);
        throttle = throttle.clamp(
            state.last_throttle_dem - incr,
            state.last_throttle_dem + incr,
        );
        state.last_throttle_dem = throttle;
    }

    // Allow 10% saturation for noise, and keep the amplitude small so the integrator
    // comes off its limits quickly.
    let max_amp = 0.5 * (limits.thr_max - thr_min_clipped);
    let integ_max = (limits.thr_max - throttle + 0.1).clamp(-max_amp, max_amp);
    let integ_min = (limits.thr_min - throttle - 0.1).clamp(-max_amp, max_amp);

    state.integ_thr += state.ste_error * config.integrator_gain() * inputs.dt * k_ste2thr;
    if inputs.policy.climbout {
        if !inputs.reached_speed_takeoff {
            // full power through the ground roll
            throttle = throttle.max(limits.thr_max - state.integ_thr);
        }
        state.integ_thr = integ_max;
    } else {
        state.integ_thr = state.integ_thr.clamp(integ_min, integ_max);
    }

    limits.clamp_throttle(throttle + state.integ_thr)
}

fn pid_law(state: &mut ThrottleState, inputs: &ThrottleInputs, config: &TecsConfig) -> f32 {
    let error = inputs.tas_state - inputs.tas_dem;
    let terms = state.pid.step(
        inputs.now,
        error,
        config.throttle_pid,
        config.imax,
        config.d_hz,
        IntegralForm::Accumulated,
    );
    let throttle = inputs
        .limits
        .clamp_throttle(trim_throttle(inputs.tas_state) + terms.sum());
    state.last_throttle_dem = throttle;
    throttle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PidGains;
    use crate::demand::{HeightDemand, SpeedDemand};
    use cu_tecs_payloads::{FlightStage, GRAVITY_MSS};

    fn energies(height: f32, target: f32, tas: f32) -> SpecificEnergies {
        let mut hgt = HeightDemand::default();
        hgt.reset(target);
        let mut spd = SpeedDemand::default();
        spd.reset(tas);
        SpecificEnergies::compute(&hgt, &spd, height, 0.0, tas, 0.0, 0.0)
    }

    fn inputs<'a>(e: &'a SpecificEnergies, stage: FlightStage) -> ThrottleInputs<'a> {
        let config = TecsConfig::default();
        let policy = StagePolicy::for_stage(stage);
        ThrottleInputs {
            now: CuTime::from(1_000_000_000u64),
            dt: 0.1,
            energies: e,
            rates: EnergyRateLimits::from_config(&config),
            limits: ControlLimits::compute(&config, &policy, 90.0),
            policy,
            envelope: SpeedEnvelope {
                tas_dem: 15.0,
                tas_min: 9.0,
                tas_max: 22.0,
            },
            tas_state: 15.0,
            tas_dem: 15.0,
            cos_phi: 1.0,
            underspeed: false,
            reached_speed_takeoff: false,
            throttle_nudge_pct: 0,
        }
    }

    #[test]
    fn law_selection() {
        let mut config = TecsConfig::default();
        assert_eq!(ThrottleLaw::select(&config, true, false), ThrottleLaw::Energy);
        assert_eq!(ThrottleLaw::select(&config, false, false), ThrottleLaw::Manual);
        assert_eq!(ThrottleLaw::select(&config, false, true), ThrottleLaw::Energy);
        config.manual_throttle = true;
        assert_eq!(ThrottleLaw::select(&config, true, false), ThrottleLaw::Manual);
        config.throttle_pid_enable = true;
        assert_eq!(ThrottleLaw::select(&config, false, false), ThrottleLaw::Pid);
    }

    #[test]
    fn on_target_level_flight_holds_cruise() {
        let config = TecsConfig::default();
        let e = energies(10.0, 10.0, 15.0);
        let mut state = ThrottleState::default();
        state.reset(config.cruise_throttle());
        let thr = ThrottleLaw::Energy.update(&mut state, &inputs(&e, FlightStage::Normal), &config);
        assert!((thr - 0.45).abs() < 1e-5, "throttle {thr}");
        assert_eq!(state.integ_thr, 0.0);
    }

    #[test]
    fn underspeed_saturates_to_max() {
        let config = TecsConfig::default();
        let e = energies(30.0, 0.0, 15.0);
        let mut state = ThrottleState::default();
        let mut i = inputs(&e, FlightStage::Normal);
        i.underspeed = true;
        assert_eq!(ThrottleLaw::Energy.update(&mut state, &i, &config), 0.75);
    }

    #[test]
    fn vtol_ignores_height_error() {
        let config = TecsConfig::default();
        let low = energies(0.0, 50.0, 15.0);
        let mut state = ThrottleState::default();
        ThrottleLaw::Energy.update(&mut state, &inputs(&low, FlightStage::Vtol), &config);
        assert_eq!(state.ste_error, 0.0);

        let mut state = ThrottleState::default();
        ThrottleLaw::Energy.update(&mut state, &inputs(&low, FlightStage::Normal), &config);
        // clamped to what the speed envelope can absorb
        assert_eq!(state.ste_error, 0.5 * 22.0 * 22.0 - 0.5 * 15.0 * 15.0);
        assert!(state.ste_error < 50.0 * GRAVITY_MSS);
    }

    #[test]
    fn slew_rate_bounds_each_step() {
        let mut config = TecsConfig::default();
        config.airframe.throttle_slewrate = 10.0;
        let e = energies(0.0, 50.0, 15.0);
        let mut state = ThrottleState::default();
        state.reset(0.3);
        let i = inputs(&e, FlightStage::Normal);
        let thr = ThrottleLaw::Energy.update(&mut state, &i, &config);
        // 0.1 s * 0.75 * 10 %/s
        assert!((state.last_throttle_dem - 0.3075).abs() < 1e-5);
        assert!(thr <= 0.75);
    }

    #[test]
    fn climbout_forces_integrator_to_upper_clamp() {
        let config = TecsConfig::default();
        let e = energies(0.0, 0.0, 15.0);
        let mut state = ThrottleState::default();
        state.reset(config.cruise_throttle());
        let thr = ThrottleLaw::Energy.update(&mut state, &inputs(&e, FlightStage::Takeoff), &config);
        assert_eq!(thr, 0.75);
        assert!(state.integ_thr > 0.0);
    }

    #[test]
    fn manual_passes_the_nudge_through() {
        let config = TecsConfig::default();
        let e = energies(0.0, 0.0, 15.0);
        let mut state = ThrottleState::default();
        let mut i = inputs(&e, FlightStage::Normal);
        i.throttle_nudge_pct = 40;
        assert_eq!(ThrottleLaw::Manual.update(&mut state, &i, &config), 0.4);
        i.throttle_nudge_pct = 120;
        assert_eq!(ThrottleLaw::Manual.update(&mut state, &i, &config), 0.75);
    }

    #[test]
    fn pid_adds_trim_feed_forward() {
        let config = TecsConfig {
            throttle_pid: PidGains {
                kp: 0.1,
                ki: 0.0,
                kd: 0.0,
            },
            ..Default::default()
        };
        let e = energies(0.0, 0.0, 5.0);
        let mut state = ThrottleState::default();
        let mut i = inputs(&e, FlightStage::Normal);
        i.tas_state = 4.0;
        i.tas_dem = 5.0;
        let thr = ThrottleLaw::Pid.update(&mut state, &i, &config);
        assert!((thr - (trim_throttle(4.0) - 0.1)).abs() < 1e-5, "throttle {thr}");
    }
}
