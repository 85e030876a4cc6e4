//! Specific energies and their rates. Everything here is recomputed from scratch each cycle.

use crate::config::TecsConfig;
use crate::demand::{HeightDemand, SpeedDemand};
use cu_tecs_payloads::GRAVITY_MSS;

/// Achievable total energy rate, from the configured climb and sink performance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyRateLimits {
    pub ste_dot_max: f32,
    pub ste_dot_min: f32,
}

impl EnergyRateLimits {
    pub fn from_config(config: &TecsConfig) -> Self {
        Self {
            ste_dot_max: config.max_climb_rate * GRAVITY_MSS,
            ste_dot_min: -config.min_sink_rate * GRAVITY_MSS,
        }
    }

    /// Width of the envelope, never zero once the configuration is validated.
    pub fn range(&self) -> f32 {
        self.ste_dot_max - self.ste_dot_min
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpecificEnergies {
    pub spe_dem: f32,
    pub ske_dem: f32,
    pub spe_dot_dem: f32,
    pub ske_dot_dem: f32,
    pub spe_est: f32,
    pub ske_est: f32,
    pub spe_dot: f32,
    pub ske_dot: f32,
}

impl SpecificEnergies {
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        height_demand: &HeightDemand,
        speed_demand: &SpeedDemand,
        height: f32,
        climb_rate: f32,
        tas_state: f32,
        vel_dot: f32,
        energy_bias: f32,
    ) -> Self {
        Self {
            spe_dem: height_demand.hgt_dem_adj * GRAVITY_MSS + energy_bias,
            ske_dem: 0.5 * speed_demand.tas_dem_adj * speed_demand.tas_dem_adj,
            spe_dot_dem: height_demand.hgt_rate_dem * GRAVITY_MSS,
            ske_dot_dem: tas_state * speed_demand.tas_rate_dem,
            spe_est: height * GRAVITY_MSS + energy_bias,
            ske_est: 0.5 * tas_state * tas_state,
            spe_dot: climb_rate * GRAVITY_MSS,
            ske_dot: tas_state * vel_dot,
        }
    }

    pub fn spe_error(&self) -> f32 {
        self.spe_dem - self.spe_est
    }

    pub fn ske_error(&self) -> f32 {
        self.ske_dem - self.ske_est
    }

    /// Total energy rate, estimated.
    pub fn ste_dot(&self) -> f32 {
        self.spe_dot + self.ske_dot
    }
}
