//! Pitch strategies: specific energy balance law and height PID.

use crate::config::{BankDisableLevel, PidGains, TecsConfig};
use crate::energy::SpecificEnergies;
use crate::limits::ControlLimits;
use crate::pid::{IntegralForm, PidState};
use crate::stage::StagePolicy;
use cu29::prelude::*;
use cu_tecs_payloads::GRAVITY_MSS;

/// Margin beyond the pitch limits the energy balance integrator may wind to, about 4.5°.
const SEB_INTEGRATOR_MARGIN: f32 = 0.0783;

#[derive(Debug, Clone, Copy, Default)]
pub struct PitchState {
    pub pitch_dem: f32,
    /// Demand before clamping to the pitch limits.
    pub pitch_dem_unc: f32,
    pub last_pitch_dem: f32,
    pub integ_seb: f32,
    /// Last integrator step, before its range clamp.
    pub seb_delta: f32,
    pub ske_weighting: f32,
    pub pid: PidState,
}

impl PitchState {
    pub fn reset(&mut self, pitch: f32) {
        self.integ_seb = 0.0;
        self.last_pitch_dem = pitch;
        self.pitch_dem_unc = pitch;
        self.pid.reset();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PitchInputs<'a> {
    pub now: CuTime,
    pub dt: f32,
    pub energies: &'a SpecificEnergies,
    pub limits: ControlLimits,
    pub policy: StagePolicy,
    pub tas_state: f32,
    pub height: f32,
    pub roll: f32,
    pub cos_phi: f32,
    pub airspeed_sensor: bool,
    pub underspeed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchLaw {
    EnergyBalance,
    Pid,
}

impl PitchLaw {
    pub fn select(config: &TecsConfig) -> Self {
        if config.pitch_pid_enable {
            PitchLaw::Pid
        } else {
            PitchLaw::EnergyBalance
        }
    }

    pub fn update(self, state: &mut PitchState, inputs: &PitchInputs, config: &TecsConfig) -> f32 {
        state.pitch_dem = match self {
            PitchLaw::EnergyBalance => energy_balance_law(state, inputs, config),
            PitchLaw::Pid => pid_law(state, inputs, config),
        };
        state.last_pitch_dem = state.pitch_dem;
        state.pitch_dem
    }
}

fn energy_balance_law(state: &mut PitchState, inputs: &PitchInputs, config: &TecsConfig) -> f32 {
    let e = inputs.energies;
    let limits = &inputs.limits;
    let tc = config.time_constant();

    let ske_w = inputs
        .policy
        .ske_weighting(config.spd_weight, inputs.airspeed_sensor, inputs.underspeed);
    let spe_w = 2.0 - ske_w;
    state.ske_weighting = ske_w;

    let seb_dem = e.spe_dem * spe_w - e.ske_dem * ske_w;
    let seb_dot_dem = e.spe_dot_dem * spe_w - e.ske_dot_dem * ske_w;
    let seb_error = seb_dem - (e.spe_est * spe_w - e.ske_est * ske_w);
    let seb_dot_error = seb_dot_dem - (e.spe_dot * spe_w - e.ske_dot * ske_w);

    // one-sided anti-windup against the bound already exceeded
    let mut integ_input = seb_error * config.integrator_gain();
    if state.pitch_dem_unc > limits.pitch_max {
        integ_input = integ_input.min(limits.pitch_max - state.pitch_dem_unc);
    } else if state.pitch_dem_unc < limits.pitch_min {
        integ_input = integ_input.max(limits.pitch_min - state.pitch_dem_unc);
    }
    let integ_delta = integ_input * inputs.dt;
    state.seb_delta = integ_delta;

    let gain_inv = inputs.tas_state * tc * GRAVITY_MSS;
    let mut working_point = seb_error + seb_dot_dem * tc + seb_dot_error * config.ptch_damp;
    if inputs.policy.climbout {
        working_point += limits.pitch_min * gain_inv;
    }

    let integ_min = gain_inv * (limits.pitch_min - SEB_INTEGRATOR_MARGIN) - working_point;
    let integ_max = gain_inv * (limits.pitch_max + SEB_INTEGRATOR_MARGIN) - working_point;
    let step_limit = 0.1 * (integ_max - integ_min);
    let integ_delta = integ_delta.clamp(-step_limit, step_limit);
    state.integ_seb = (state.integ_seb + integ_delta).clamp(integ_min, integ_max);

    state.pitch_dem_unc = (working_point + state.integ_seb) / gain_inv;
    let pitch = limits.clamp_pitch(state.pitch_dem_unc);

    // vertical acceleration limit
    let incr = (inputs.dt * config.vert_acc_lim / inputs.tas_state).max(0.0);
    let pitch = pitch.clamp(state.last_pitch_dem - incr, state.last_pitch_dem + incr);
    limits.clamp_pitch(pitch)
}

fn pid_law(state: &mut PitchState, inputs: &PitchInputs, config: &TecsConfig) -> f32 {
    let tas2 = inputs.tas_state * inputs.tas_state;

    let mut ff = config.pitch_ff_gain / tas2;
    if config.pitch_roll_ff_gain > 0.0 {
        ff *= config.pitch_roll_ff_gain * (1.0 / inputs.cos_phi.max(0.1) + 1.0);
    }

    let mut gains = PidGains {
        kp: config.pitch_pid.kp / tas2,
        ki: config.pitch_pid.ki / tas2,
        kd: config.pitch_pid.kd / tas2,
    };
    let bank_limit = config.bank_disable_angle_deg.to_radians();
    if bank_limit > 0.0 && inputs.roll.abs() > bank_limit {
        let level = config.bank_pid_disable;
        if level >= BankDisableLevel::P {
            gains.kp = 0.0;
        }
        if level >= BankDisableLevel::PD {
            gains.kd = 0.0;
        }
        if level >= BankDisableLevel::PID {
            gains.ki = 0.0;
        }
    }

    let error = inputs.height - config.fix_height;
    let terms = state.pid.step(
        inputs.now,
        error,
        gains,
        config.imax,
        config.d_hz,
        IntegralForm::Scaled,
    );
    state.pitch_dem_unc = ff + terms.sum();
    inputs.limits.clamp_pitch(state.pitch_dem_unc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::{HeightDemand, SpeedDemand};
    use cu_tecs_payloads::FlightStage;

    fn energies(height: f32, target: f32, tas: f32) -> SpecificEnergies {
        let mut hgt = HeightDemand::default();
        hgt.reset(target);
        let mut spd = SpeedDemand::default();
        spd.reset(tas);
        SpecificEnergies::compute(&hgt, &spd, height, 0.0, tas, 0.0, 0.0)
    }

    fn inputs<'a>(e: &'a SpecificEnergies, config: &TecsConfig) -> PitchInputs<'a> {
        let policy = StagePolicy::for_stage(FlightStage::Normal);
        PitchInputs {
            now: CuTime::from(1_000_000_000u64),
            dt: 0.1,
            energies: e,
            limits: ControlLimits::compute(config, &policy, 90.0),
            policy,
            tas_state: 15.0,
            height: 0.0,
            roll: 0.0,
            cos_phi: 1.0,
            airspeed_sensor: true,
            underspeed: false,
        }
    }

    #[test]
    fn on_target_holds_level() {
        let config = TecsConfig::default();
        let e = energies(5.0, 5.0, 15.0);
        let mut state = PitchState::default();
        let pitch = PitchLaw::EnergyBalance.update(&mut state, &inputs(&e, &config), &config);
        assert_eq!(pitch, 0.0);
        assert_eq!(state.ske_weighting, 1.0);
    }

    #[test]
    fn below_target_pitches_up_within_rate_limit() {
        let config = TecsConfig::default();
        let e = energies(0.0, 20.0, 15.0);
        let mut state = PitchState::default();
        let i = inputs(&e, &config);
        let mut last = 0.0;
        for _ in 0..50 {
            let pitch = PitchLaw::EnergyBalance.update(&mut state, &i, &config);
            let incr = i.dt * config.vert_acc_lim / i.tas_state;
            assert!((pitch - last).abs() <= incr + 1e-6);
            assert!(pitch <= i.limits.pitch_max);
            last = pitch;
        }
        assert_eq!(last, i.limits.pitch_max);
    }

    #[test]
    fn integrator_does_not_wind_past_saturation() {
        let config = TecsConfig::default();
        let far = energies(0.0, 200.0, 15.0);
        let mut state = PitchState::default();
        let i = inputs(&far, &config);
        for _ in 0..500 {
            PitchLaw::EnergyBalance.update(&mut state, &i, &config);
        }
        assert!(state.pitch_dem_unc <= i.limits.pitch_max + SEB_INTEGRATOR_MARGIN + 1e-5);

        // once on target the nose comes down right away
        let reached = energies(200.0, 200.0, 15.0);
        let i = inputs(&reached, &config);
        for _ in 0..10 {
            PitchLaw::EnergyBalance.update(&mut state, &i, &config);
        }
        assert!(state.pitch_dem < i.limits.pitch_max);
    }

    #[test]
    fn pid_law_scales_gains_with_speed() {
        let config = TecsConfig {
            pitch_pid_enable: true,
            fix_height: 1.0,
            pitch_pid: PidGains {
                kp: -22.5,
                ki: 0.0,
                kd: 0.0,
            },
            ..Default::default()
        };
        let e = energies(0.0, 1.0, 15.0);
        let mut state = PitchState::default();
        let i = inputs(&e, &config);
        let pitch = PitchLaw::select(&config).update(&mut state, &i, &config);
        // error of -1 m at 15 m/s: 22.5 / 225
        assert!((pitch - 0.1).abs() < 1e-6, "pitch {pitch}");
    }

    #[test]
    fn bank_disable_level_three_leaves_feed_forward_only() {
        let config = TecsConfig {
            pitch_pid_enable: true,
            fix_height: 1.0,
            pitch_ff_gain: 11.25,
            bank_pid_disable: BankDisableLevel::PID,
            bank_disable_angle_deg: 30.0,
            pitch_pid: PidGains {
                kp: -22.5,
                ki: -5.0,
                kd: -3.0,
            },
            ..Default::default()
        };
        let e = energies(0.0, 1.0, 15.0);
        let mut state = PitchState::default();
        let mut i = inputs(&e, &config);
        i.roll = 45f32.to_radians();
        for step in 0..5u64 {
            i.now = CuTime::from(1_000_000_000u64 + step * 100_000_000);
            let pitch = PitchLaw::Pid.update(&mut state, &i, &config);
            assert!((pitch - 0.05).abs() < 1e-6, "pitch {pitch}");
        }
    }
}
