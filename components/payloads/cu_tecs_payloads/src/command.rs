use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Discrete phase of flight selected by the mode logic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum FlightStage {
    #[default]
    Normal,
    Takeoff,
    Vtol,
    Land,
    AbortLand,
}

impl FlightStage {
    /// Takeoff and aborted landings share the climb-out rules.
    pub fn is_climbout(self) -> bool {
        matches!(self, FlightStage::Takeoff | FlightStage::AbortLand)
    }
}

/// Per-cycle demands from the flight mode logic.
#[derive(Debug, Clone, Copy, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub struct TecsCommandPayload {
    /// Requested height in metres. Recorded, the energy target comes from the configured fixed height.
    pub height_dem_m: f32,
    /// Requested equivalent airspeed in m/s.
    pub airspeed_dem_mps: f32,
    pub flight_stage: FlightStage,
    pub distance_beyond_land_wp_m: f32,
    /// Pitch floor used while climbing out, in degrees.
    pub climbout_pitch_min_deg: f32,
    /// Manual throttle in percent, used when no airspeed is available.
    pub throttle_nudge_pct: i16,
    pub height_above_field_m: f32,
    /// Aerodynamic load factor, raises the minimum airspeed when stall prevention is on.
    pub load_factor: f32,
}

impl Default for TecsCommandPayload {
    /// Level unaccelerated flight, a load factor of 0 would mean free fall.
    fn default() -> Self {
        Self {
            height_dem_m: 0.0,
            airspeed_dem_mps: 0.0,
            flight_stage: FlightStage::Normal,
            distance_beyond_land_wp_m: 0.0,
            climbout_pitch_min_deg: 0.0,
            throttle_nudge_pct: 0,
            height_above_field_m: 0.0,
            load_factor: 1.0,
        }
    }
}

impl TecsCommandPayload {
    pub fn cruise(height_dem_m: f32, airspeed_dem_mps: f32) -> Self {
        Self {
            height_dem_m,
            airspeed_dem_mps,
            ..Default::default()
        }
    }

    pub fn with_stage(mut self, flight_stage: FlightStage) -> Self {
        self.flight_stage = flight_stage;
        self
    }
}
