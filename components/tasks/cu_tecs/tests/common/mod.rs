#![allow(dead_code)]

use cu29::prelude::*;
use cu_tecs::{Tecs, TecsConfig};
use cu_tecs_payloads::{NavPayload, TecsCommandPayload, TecsOutputPayload, GRAVITY_MSS};

pub const FAST_PERIOD_MS: u64 = 20;
pub const DISPATCH_PERIOD_MS: u64 = 100;

/// Thrust at full throttle and drag coefficient of the point mass, trimmed for 15 m/s level
/// flight at 45 % throttle.
const THRUST_MSS: f32 = 8.0;
const DRAG_COEFF: f32 = THRUST_MSS * 0.45 / (15.0 * 15.0);

pub fn at_ms(ms: u64) -> CuTime {
    CuTime::from(ms * 1_000_000)
}

pub fn level_nav(height: f32, airspeed: f32) -> NavPayload {
    NavPayload::from_raw([0.0, 0.0], height, Some(0.0), Some(airspeed))
}

/// Longitudinal point mass flying the pitch demand as its flight path angle.
#[derive(Debug, Clone, Copy)]
pub struct PointMass {
    pub height: f32,
    pub tas: f32,
    pub pitch: f32,
    pub roll: f32,
    pub climb_rate: f32,
    pub accel: f32,
}

impl PointMass {
    pub fn new(height: f32, tas: f32) -> Self {
        Self {
            height,
            tas,
            pitch: 0.0,
            roll: 0.0,
            climb_rate: 0.0,
            accel: 0.0,
        }
    }

    pub fn step(&mut self, pitch_dem: f32, throttle_dem: f32, dt: f32) {
        self.pitch = pitch_dem;
        self.accel = THRUST_MSS * throttle_dem
            - DRAG_COEFF * self.tas * self.tas
            - GRAVITY_MSS * self.pitch.sin();
        self.tas = (self.tas + self.accel * dt).max(1.0);
        self.climb_rate = self.tas * self.pitch.sin();
        self.height += self.climb_rate * dt;
    }

    pub fn nav(&self) -> NavPayload {
        let accel_forward = self.accel + GRAVITY_MSS * self.pitch.sin();
        NavPayload::from_raw(
            [self.roll, self.pitch],
            self.height,
            Some(self.climb_rate),
            Some(self.tas),
        )
        .with_accels(-GRAVITY_MSS, accel_forward)
    }
}

/// Controller in the loop with a point mass, fast loop at 50 Hz and dispatch at 10 Hz.
pub struct ClosedLoop {
    pub tecs: Tecs,
    pub plant: PointMass,
    pub now_ms: u64,
    pub last: TecsOutputPayload,
}

impl ClosedLoop {
    pub fn new(config: TecsConfig, plant: PointMass) -> Self {
        Self {
            tecs: Tecs::new(config),
            plant,
            now_ms: 0,
            last: TecsOutputPayload::default(),
        }
    }

    /// Fly `seconds` of `cmd`, returning every dispatch output.
    pub fn fly(&mut self, cmd: &TecsCommandPayload, seconds: f32) -> Vec<TecsOutputPayload> {
        let steps = (seconds * 1000.0) as u64 / FAST_PERIOD_MS;
        let mut outputs = Vec::new();
        for _ in 0..steps {
            let nav = self.plant.nav();
            let now = at_ms(self.now_ms);
            self.tecs.update_fast_estimators(now, &nav);
            if self.now_ms % DISPATCH_PERIOD_MS == 0 {
                self.last = self.tecs.update_pitch_throttle(now, &nav, cmd);
                outputs.push(self.last);
            }
            self.plant.step(
                self.last.pitch_dem,
                self.last.throttle_dem,
                FAST_PERIOD_MS as f32 / 1000.0,
            );
            self.now_ms += FAST_PERIOD_MS;
        }
        outputs
    }
}

/// Dispatch `cycles` times on a frozen navigation sample, 100 ms apart, starting at `start_ms`.
pub fn dispatch_frozen(
    tecs: &mut Tecs,
    nav: &NavPayload,
    cmd: &TecsCommandPayload,
    start_ms: u64,
    cycles: u64,
) -> Vec<TecsOutputPayload> {
    (0..cycles)
        .map(|i| {
            let now = at_ms(start_ms + i * DISPATCH_PERIOD_MS);
            tecs.update_fast_estimators(now, nav);
            tecs.update_pitch_throttle(now, nav, cmd)
        })
        .collect()
}
