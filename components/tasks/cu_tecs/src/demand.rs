//! Shapes the raw height and airspeed demands into achievable trajectories.

use crate::estimator::SpeedEnvelope;

/// Nominal dispatch period the speed demand rate limit is evaluated at, decoupled from jitter.
pub const DEMAND_STEP_S: f32 = 0.1;

/// Rate limited true airspeed demand.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedDemand {
    /// Raw demand clamped into the envelope.
    pub tas_dem: f32,
    pub tas_dem_adj: f32,
    pub tas_dem_last: f32,
    /// Demanded rate of change of true airspeed, m/s².
    pub tas_rate_dem: f32,
}

impl SpeedDemand {
    /// Move the adjusted demand toward the raw one.
    ///
    /// Half of the total energy rate envelope is allotted to speed changes, the other half
    /// stays with the height loop. `force_min` pins the demand to the envelope minimum while
    /// an envelope protection latch is set.
    pub fn update(
        &mut self,
        envelope: &SpeedEnvelope,
        tas_state: f32,
        ste_rate_max: f32,
        ste_rate_min: f32,
        force_min: bool,
    ) {
        let raw = if force_min {
            envelope.tas_min
        } else {
            envelope.tas_dem
        };
        self.tas_dem = raw.clamp(envelope.tas_min, envelope.tas_max);

        let vel_rate_max = 0.5 * ste_rate_max / tas_state;
        let vel_rate_min = 0.5 * ste_rate_min / tas_state;

        let delta = self.tas_dem - self.tas_dem_adj;
        if delta > vel_rate_max * DEMAND_STEP_S {
            self.tas_dem_adj += vel_rate_max * DEMAND_STEP_S;
            self.tas_rate_dem = vel_rate_max;
        } else if delta < vel_rate_min * DEMAND_STEP_S {
            self.tas_dem_adj += vel_rate_min * DEMAND_STEP_S;
            self.tas_rate_dem = vel_rate_min;
        } else {
            self.tas_dem_adj = self.tas_dem;
            self.tas_rate_dem = (self.tas_dem - self.tas_dem_last) / DEMAND_STEP_S;
        }

        // the adjusted demand can sit outside the envelope right after a reset
        self.tas_dem_adj = self.tas_dem_adj.clamp(envelope.tas_min, envelope.tas_max);
        self.tas_dem_last = self.tas_dem;
    }

    /// Snap every tracker to `tas_dem`.
    pub fn reset(&mut self, tas_dem: f32) {
        self.tas_dem = tas_dem;
        self.tas_dem_adj = tas_dem;
        self.tas_dem_last = tas_dem;
        self.tas_rate_dem = 0.0;
    }
}

/// Height demand. The controller holds a fixed height, so the demanded climb rate is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeightDemand {
    pub hgt_dem: f32,
    pub hgt_dem_adj: f32,
    pub hgt_rate_dem: f32,
    /// Height requested by the mode logic, only recorded.
    pub commanded: f32,
}

impl HeightDemand {
    pub fn update(&mut self, fix_height: f32, commanded: f32) {
        self.commanded = commanded;
        self.hgt_dem = fix_height;
        self.hgt_dem_adj = fix_height;
        self.hgt_rate_dem = 0.0;
    }

    pub fn reset(&mut self, fix_height: f32) {
        self.hgt_dem = fix_height;
        self.hgt_dem_adj = fix_height;
        self.hgt_rate_dem = 0.0;
    }
}
