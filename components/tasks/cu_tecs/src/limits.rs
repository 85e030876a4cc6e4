use crate::config::TecsConfig;
use crate::stage::StagePolicy;

/// Value of the temporary pitch limit when none is pending.
pub const NO_PITCH_LIMIT_DEG: f32 = 90.0;

/// Output bounds for one dispatch cycle. Throttle is a fraction, pitch in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlLimits {
    pub thr_min: f32,
    pub thr_max: f32,
    pub pitch_min: f32,
    pub pitch_max: f32,
}

impl Default for ControlLimits {
    fn default() -> Self {
        Self {
            thr_min: 0.0,
            thr_max: 1.0,
            pitch_min: -NO_PITCH_LIMIT_DEG.to_radians(),
            pitch_max: NO_PITCH_LIMIT_DEG.to_radians(),
        }
    }
}

impl ControlLimits {
    /// TECS pitch limits only narrow the airframe ones. `temp_pitch_max_deg` below 90 caps
    /// both sides for this cycle.
    pub fn compute(config: &TecsConfig, policy: &StagePolicy, temp_pitch_max_deg: f32) -> Self {
        let airframe = &config.airframe;
        let thr_max =
            policy.throttle_max_pct(airframe.throttle_max, airframe.takeoff_throttle_max) / 100.0;
        let thr_min = (airframe.throttle_min / 100.0).min(thr_max);

        let mut pitch_max = if config.pitch_max_deg <= 0.0 {
            airframe.pitch_limit_max_deg
        } else {
            config.pitch_max_deg.min(airframe.pitch_limit_max_deg)
        };
        let mut pitch_min = if config.pitch_min_deg >= 0.0 {
            airframe.pitch_limit_min_deg
        } else {
            config.pitch_min_deg.max(airframe.pitch_limit_min_deg)
        };

        if temp_pitch_max_deg < NO_PITCH_LIMIT_DEG {
            pitch_max = pitch_max.clamp(-NO_PITCH_LIMIT_DEG, temp_pitch_max_deg);
            pitch_min = pitch_min.max(-temp_pitch_max_deg);
        }
        // an inverted range collapses onto the maximum
        let pitch_min = pitch_min.min(pitch_max);

        Self {
            thr_min,
            thr_max,
            pitch_min: pitch_min.to_radians(),
            pitch_max: pitch_max.to_radians(),
        }
    }

    pub fn clamp_throttle(&self, throttle: f32) -> f32 {
        throttle.clamp(self.thr_min, self.thr_max)
    }

    pub fn clamp_pitch(&self, pitch: f32) -> f32 {
        pitch.clamp(self.pitch_min, self.pitch_max)
    }

    /// Lower throttle bound, never below zero.
    pub fn thr_min_clipped(&self) -> f32 {
        self.thr_min.max(0.0).min(self.thr_max)
    }
}
