//! Flight stage specific rules, gathered in one place so the control laws stay branch free.

use cu_tecs_payloads::FlightStage;

/// What a flight stage changes in the control laws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePolicy {
    /// Takeoff or aborted landing: pitch floor from the command, full power integrator.
    pub climbout: bool,
    /// Drop the potential energy error from the throttle law.
    pub exclude_potential_energy: bool,
    /// Force pure height priority on the pitch axis.
    pub height_priority: bool,
    /// Force pure speed priority on the pitch axis.
    pub speed_priority: bool,
    pub underspeed_allowed: bool,
}

impl StagePolicy {
    pub fn for_stage(stage: FlightStage) -> Self {
        let climbout = stage.is_climbout();
        let vtol = stage == FlightStage::Vtol;
        Self {
            climbout,
            exclude_potential_energy: vtol,
            height_priority: vtol,
            speed_priority: climbout,
            underspeed_allowed: !vtol,
        }
    }

    /// Speed weighting of the energy balance, 0 is height first and 2 is speed first.
    pub fn ske_weighting(&self, nominal: f32, airspeed_sensor: bool, underspeed: bool) -> f32 {
        if !airspeed_sensor || self.height_priority {
            0.0
        } else if underspeed || self.speed_priority {
            2.0
        } else {
            nominal.clamp(0.0, 2.0)
        }
    }

    /// Minimum pitch, in degrees, while climbing out.
    pub fn pitch_min_override_deg(&self, climbout_pitch_min_deg: f32) -> Option<f32> {
        self.climbout.then_some(climbout_pitch_min_deg)
    }

    /// Maximum throttle percentage for this stage.
    pub fn throttle_max_pct(&self, throttle_max: f32, takeoff_throttle_max: f32) -> f32 {
        if self.climbout && takeoff_throttle_max != 0.0 {
            takeoff_throttle_max
        } else {
            throttle_max
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtol_is_height_first_without_potential_energy() {
        let policy = StagePolicy::for_stage(FlightStage::Vtol);
        assert!(policy.exclude_potential_energy);
        assert!(!policy.underspeed_allowed);
        assert_eq!(policy.ske_weighting(1.0, true, true), 0.0);
    }

    #[test]
    fn climbout_stages_are_speed_first() {
        for stage in [FlightStage::Takeoff, FlightStage::AbortLand] {
            let policy = StagePolicy::for_stage(stage);
            assert!(policy.climbout);
            assert_eq!(policy.ske_weighting(0.5, true, false), 2.0);
            assert_eq!(policy.pitch_min_override_deg(12.0), Some(12.0));
            assert_eq!(policy.throttle_max_pct(75.0, 100.0), 100.0);
            assert_eq!(policy.throttle_max_pct(75.0, 0.0), 75.0);
        }
    }

    #[test]
    fn normal_stage_uses_clamped_nominal_weight() {
        let policy = StagePolicy::for_stage(FlightStage::Normal);
        assert_eq!(policy.ske_weighting(3.0, true, false), 2.0);
        assert_eq!(policy.ske_weighting(0.7, true, false), 0.7);
        assert_eq!(policy.ske_weighting(0.7, false, false), 0.0);
        assert_eq!(policy.ske_weighting(0.7, true, true), 2.0);
        assert_eq!(policy.pitch_min_override_deg(12.0), None);
        assert_eq!(policy.throttle_max_pct(75.0, 100.0), 75.0);
    }
}
