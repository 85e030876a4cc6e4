use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Latched controller status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TecsFlags {
    pub underspeed: bool,
    pub bad_descent: bool,
    pub reached_speed_takeoff: bool,
    pub takeoff_complete: bool,
    pub is_doing_auto_land: bool,
}

impl TecsFlags {
    const UNDERSPEED: u8 = 1 << 0;
    const BAD_DESCENT: u8 = 1 << 1;
    const AUTO_LAND: u8 = 1 << 2;
    const REACHED_SPEED_TAKEOFF: u8 = 1 << 3;
    const TAKEOFF_COMPLETE: u8 = 1 << 4;

    /// Packed representation used by log readers.
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.underspeed {
            bits |= Self::UNDERSPEED;
        }
        if self.bad_descent {
            bits |= Self::BAD_DESCENT;
        }
        if self.is_doing_auto_land {
            bits |= Self::AUTO_LAND;
        }
        if self.reached_speed_takeoff {
            bits |= Self::REACHED_SPEED_TAKEOFF;
        }
        if self.takeoff_complete {
            bits |= Self::TAKEOFF_COMPLETE;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            underspeed: bits & Self::UNDERSPEED != 0,
            bad_descent: bits & Self::BAD_DESCENT != 0,
            is_doing_auto_land: bits & Self::AUTO_LAND != 0,
            reached_speed_takeoff: bits & Self::REACHED_SPEED_TAKEOFF != 0,
            takeoff_complete: bits & Self::TAKEOFF_COMPLETE != 0,
        }
    }
}

/// Everything an external recorder needs to reconstruct one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct TecsDiagnostics {
    pub time_us: u64,
    pub height: f32,
    pub climb_rate: f32,
    pub height_dem: f32,
    pub height_rate_dem: f32,
    pub tas_dem_adj: f32,
    pub tas: f32,
    pub vel_dot: f32,
    pub integ_thr: f32,
    pub integ_seb: f32,
    pub throttle_dem: f32,
    pub pitch_dem: f32,
    pub tas_rate_dem: f32,
    pub ske_weighting: f32,
    pub flags: u8,
    pub ske_error: f32,
    pub spe_error: f32,
    pub seb_delta: f32,
    pub load_factor: f32,
    pub pitch_pid_integrator: f32,
    pub cos_phi: f32,
    pub nav_height: f32,
    pub nav_climb_rate: f32,
    pub accel_down: f32,
    pub distance_beyond_land_wp: f32,
    pub height_above_field: f32,
}

/// Output of the TECS task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct TecsOutputPayload {
    /// Pitch demand in radians.
    pub pitch_dem: f32,
    /// Throttle demand as a fraction of full scale.
    pub throttle_dem: f32,
    pub diagnostics: TecsDiagnostics,
}

impl Display for TecsOutputPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pitch: {:.3} rad throttle: {:.3} ith: {:.3} iph: {:.3}",
            self.pitch_dem, self.throttle_dem, self.diagnostics.integ_thr, self.diagnostics.integ_seb
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_are_distinct() {
        let all = TecsFlags {
            underspeed: true,
            bad_descent: true,
            reached_speed_takeoff: true,
            takeoff_complete: true,
            is_doing_auto_land: true,
        };
        assert_eq!(all.bits(), 0b1_1111);
        assert_eq!(TecsFlags::from_bits(all.bits()), all);

        let takeoff = TecsFlags {
            takeoff_complete: true,
            ..Default::default()
        };
        assert_eq!(takeoff.bits(), 1 << 4);
        assert_eq!(TecsFlags::default().bits(), 0);
    }
}
