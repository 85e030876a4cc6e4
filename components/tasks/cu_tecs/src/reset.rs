//! Controller state owned by the dispatch loop and the policy that reinitialises it.

use crate::config::TecsConfig;
use crate::demand::{HeightDemand, SpeedDemand};
use crate::limits::ControlLimits;
use crate::pitch::PitchState;
use crate::protection::EnvelopeProtection;
use crate::stage::StagePolicy;
use crate::throttle::ThrottleState;
use crate::timing::STALE_DT_S;
use cu_tecs_payloads::TecsFlags;

/// Time step used on the cycle following a stale gap.
pub const RESTART_DT_S: f32 = 0.1;

/// What got reinitialised on a dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reinit {
    /// Loop was idle for more than a second, everything restarts.
    Stale,
    /// Climbing out, demands track the targets and the pitch floor comes from the command.
    Climbout,
    None,
}

impl Reinit {
    pub fn classify(dt: f32, policy: &StagePolicy) -> Self {
        if dt > STALE_DT_S {
            Reinit::Stale
        } else if policy.climbout {
            Reinit::Climbout
        } else {
            Reinit::None
        }
    }
}

/// Values the reset policy snaps the trackers to.
#[derive(Debug, Clone, Copy)]
pub struct ResetTargets {
    /// Current attitude pitch, radians.
    pub nav_pitch: f32,
    /// True airspeed demand for this cycle.
    pub tas_dem: f32,
    pub climbout_pitch_min_deg: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerState {
    pub throttle: ThrottleState,
    pub pitch: PitchState,
    pub height_demand: HeightDemand,
    pub speed_demand: SpeedDemand,
    pub protection: EnvelopeProtection,
    pub flags: TecsFlags,
}

impl ControllerState {
    /// Apply the reset policy for this cycle and return the time step the laws should use.
    pub fn initialise(
        &mut self,
        reinit: Reinit,
        dt: f32,
        config: &TecsConfig,
        policy: &StagePolicy,
        targets: &ResetTargets,
        limits: &mut ControlLimits,
    ) -> f32 {
        let dt = match reinit {
            Reinit::Stale => {
                self.throttle.reset(config.cruise_throttle());
                self.pitch.reset(targets.nav_pitch);
                self.height_demand.reset(config.fix_height);
                self.speed_demand.reset(targets.tas_dem);
                self.protection.reset();
                self.flags.underspeed = false;
                self.flags.bad_descent = false;
                self.flags.reached_speed_takeoff = false;
                self.flags.takeoff_complete = false;
                RESTART_DT_S
            }
            Reinit::Climbout => {
                if let Some(deg) = policy.pitch_min_override_deg(targets.climbout_pitch_min_deg) {
                    limits.pitch_min = deg.to_radians().min(limits.pitch_max);
                }
                self.height_demand.reset(config.fix_height);
                self.speed_demand.reset(targets.tas_dem);
                self.flags.underspeed = false;
                self.flags.bad_descent = false;
                dt
            }
            Reinit::None => dt,
        };

        if !policy.climbout {
            // so the next takeoff gets full power again
            self.flags.reached_speed_takeoff = false;
        }
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cu_tecs_payloads::FlightStage;

    fn targets() -> ResetTargets {
        ResetTargets {
            nav_pitch: 0.05,
            tas_dem: 14.0,
            climbout_pitch_min_deg: 10.0,
        }
    }

    fn dirty_state() -> ControllerState {
        let mut state = ControllerState::default();
        state.throttle.integ_thr = 0.2;
        state.pitch.integ_seb = 30.0;
        state.speed_demand.tas_dem_adj = 20.0;
        state.flags = TecsFlags::from_bits(0b1_1111);
        state
    }

    #[test]
    fn stale_gap_resets_everything() {
        let config = TecsConfig::default();
        let policy = StagePolicy::for_stage(FlightStage::Takeoff);
        let mut limits = ControlLimits::compute(&config, &policy, 90.0);
        let before = limits;
        let mut state = dirty_state();

        let reinit = Reinit::classify(2.0, &policy);
        assert_eq!(reinit, Reinit::Stale);
        let dt = state.initialise(reinit, 2.0, &config, &policy, &targets(), &mut limits);

        assert_eq!(dt, RESTART_DT_S);
        assert_eq!(state.throttle.integ_thr, 0.0);
        assert_eq!(state.throttle.last_throttle_dem, config.cruise_throttle());
        assert_eq!(state.pitch.integ_seb, 0.0);
        assert_eq!(state.pitch.last_pitch_dem, 0.05);
        assert_eq!(state.speed_demand.tas_dem_adj, 14.0);
        assert_eq!(state.flags.bits() & 0b1_1011, 0);
        // a stale restart keeps the regular pitch floor
        assert_eq!(limits, before);
    }

    #[test]
    fn climbout_sets_pitch_floor_and_keeps_integrators() {
        let config = TecsConfig::default();
        let policy = StagePolicy::for_stage(FlightStage::AbortLand);
        let mut limits = ControlLimits::compute(&config, &policy, 90.0);
        let mut state = dirty_state();

        let reinit = Reinit::classify(0.1, &policy);
        let dt = state.initialise(reinit, 0.1, &config, &policy, &targets(), &mut limits);

        assert_eq!(dt, 0.1);
        assert_eq!(limits.pitch_min, 10f32.to_radians());
        assert_eq!(state.pitch.integ_seb, 30.0);
        assert_eq!(state.speed_demand.tas_dem_adj, 14.0);
        assert!(!state.flags.underspeed);
        assert!(!state.flags.bad_descent);
        assert!(state.flags.reached_speed_takeoff);
        assert!(state.flags.takeoff_complete);
    }

    #[test]
    fn leaving_climbout_clears_reached_speed() {
        let config = TecsConfig::default();
        let policy = StagePolicy::for_stage(FlightStage::Normal);
        let mut limits = ControlLimits::compute(&config, &policy, 90.0);
        let mut state = dirty_state();
        let reinit = Reinit::classify(0.1, &policy);
        assert_eq!(reinit, Reinit::None);
        state.initialise(reinit, 0.1, &config, &policy, &targets(), &mut limits);
        assert!(!state.flags.reached_speed_takeoff);
        assert!(state.flags.underspeed);
    }
}
