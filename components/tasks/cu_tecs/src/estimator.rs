//! Fast height and airspeed estimators feeding the energy calculations.

use crate::config::TecsConfig;
use crate::timing::{StepTimer, STALE_DT_S};
use cu29::prelude::*;
use cu_tecs_payloads::{NavPayload, GRAVITY_MSS};

const VEL_DOT_WINDOW: usize = 5;

/// Moving average of the longitudinal acceleration over the last 5 samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelDotFilter {
    samples: [f32; VEL_DOT_WINDOW],
    next: usize,
    count: usize,
}

impl VelDotFilter {
    pub fn apply(&mut self, sample: f32) -> f32 {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % VEL_DOT_WINDOW;
        self.count = (self.count + 1).min(VEL_DOT_WINDOW);
        self.samples[..self.count].iter().sum::<f32>() / self.count as f32
    }
}

/// Height and climb rate, either straight from the navigation filter or through a
/// third order baro-inertial complementary filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeightEstimator {
    pub height: f32,
    pub climb_rate: f32,
    /// Second integrator of the complementary filter.
    pub dd_height: f32,
    pub nav_height: f32,
    pub nav_climb_rate: f32,
    pub accel_down: f32,
    pub(crate) timer: StepTimer,
}

impl HeightEstimator {
    /// Advance with a new navigation sample. Returns true when the loop was stale and got reset.
    pub fn update(&mut self, now: CuTime, nav: &NavPayload, omega: f32) -> bool {
        let measured = nav.height_m();
        self.nav_height = measured;
        self.accel_down = nav.accel_down_mss();

        let mut dt = self.timer.step(now);
        let stale = dt > STALE_DT_S;
        if stale {
            self.climb_rate = 0.0;
            self.dd_height = 0.0;
            self.height = measured;
            dt = 0.02;
        }

        if let Some(climb_rate) = nav.climb_rate_mps() {
            self.nav_climb_rate = climb_rate;
            self.climb_rate = climb_rate;
            self.height = measured;
            return stale;
        }

        // Backward Euler integration, coefficients place all three poles at omega.
        let hgt_ddot_mea = -(self.accel_down + GRAVITY_MSS);
        let omega2 = omega * omega;
        let hgt_err = measured - self.height;

        self.dd_height += hgt_err * omega2 * omega * dt;
        self.climb_rate += (self.dd_height + hgt_ddot_mea + hgt_err * omega2 * 3.0) * dt;
        self.height += (self.climb_rate + hgt_err * omega * 3.0) * dt;
        self.nav_climb_rate = self.climb_rate;
        stale
    }

    /// Take height and climb rate from an external estimator, the hydrofoil uses a Kalman
    /// filter on the height above water.
    pub fn set_external(&mut self, now: CuTime, climb_rate: f32, height: f32) -> bool {
        let stale = self.timer.step(now) > STALE_DT_S;
        if stale {
            self.dd_height = 0.0;
        }
        self.height = height;
        self.nav_height = height;
        self.climb_rate = climb_rate;
        self.nav_climb_rate = climb_rate;
        stale
    }
}

/// True airspeed bounds and demand for the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpeedEnvelope {
    pub tas_dem: f32,
    pub tas_min: f32,
    pub tas_max: f32,
}

/// Second order complementary filter on true airspeed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedEstimator {
    pub tas_state: f32,
    pub integ_dtas: f32,
    /// Equivalent airspeed used on the last update, measured or synthetic.
    pub eas: f32,
    pub(crate) timer: StepTimer,
}

impl SpeedEstimator {
    /// Advance the filter and derive the airspeed envelope for the dispatch cycle.
    pub fn update(
        &mut self,
        now: CuTime,
        nav: &NavPayload,
        config: &TecsConfig,
        eas_dem: f32,
        load_factor: f32,
        synthetic_once: bool,
        vel_dot: f32,
    ) -> SpeedEnvelope {
        let airframe = &config.airframe;
        let eas2tas = nav.eas2tas;

        let tas_dem = eas_dem * eas2tas;
        let mut tas_max = airframe.airspeed_max * eas2tas;
        let mut tas_min = airframe.airspeed_min * eas2tas;
        if airframe.stall_prevention {
            tas_min *= load_factor;
        }
        if tas_max < tas_min {
            tas_max = tas_min;
        }
        if tas_min > tas_dem {
            tas_min = tas_dem;
        }

        let use_airspeed = synthetic_once || config.synthetic_airspeed || nav.airspeed_sensor_enabled;
        self.eas = use_airspeed
            .then(|| nav.airspeed_mps())
            .flatten()
            .unwrap_or(0.5 * (airframe.airspeed_min + airframe.airspeed_max));

        let mut dt = self.timer.step(now);
        if dt > STALE_DT_S {
            self.tas_state = self.eas * eas2tas;
            self.integ_dtas = 0.0;
            dt = 0.1;
        }

        let omega = config.spd_omega.max(0.1);
        let aspd_err = self.eas * eas2tas - self.tas_state;
        let mut integ_input = aspd_err * omega * omega;
        if self.tas_state < 0.2 {
            integ_input = integ_input.max(0.0);
        }
        self.integ_dtas += integ_input * dt;
        let tas_input = self.integ_dtas + vel_dot + aspd_err * omega * std::f32::consts::SQRT_2;
        self.tas_state = (self.tas_state + tas_input * dt).max(0.1);

        SpeedEnvelope {
            tas_dem,
            tas_min,
            tas_max,
        }
    }
}

/// Everything the fast loop owns.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatorState {
    pub height: HeightEstimator,
    pub speed: SpeedEstimator,
    vel_dot_filter: VelDotFilter,
    /// Averaged rate of change of airspeed, m/s².
    pub vel_dot: f32,
}

impl EstimatorState {
    /// Filter based update. Returns true when the height loop was stale.
    pub fn update_fast(&mut self, now: CuTime, nav: &NavPayload, hgt_omega: f32) -> bool {
        let stale = self.height.update(now, nav, hgt_omega);
        self.vel_dot = self.vel_dot_filter.apply(nav.longitudinal_accel_mss());
        stale
    }

    /// Height and climb rate come from elsewhere, only the acceleration average runs here.
    pub fn update_fast_external(
        &mut self,
        now: CuTime,
        nav: &NavPayload,
        climb_rate: f32,
        height: f32,
    ) -> bool {
        let stale = self.height.set_external(now, climb_rate, height);
        self.height.accel_down = nav.accel_down_mss();
        self.vel_dot = self.vel_dot_filter.apply(nav.longitudinal_accel_mss());
        stale
    }
}
