//! Standalone PID axis shared by the throttle and pitch fallback laws.

use crate::config::PidGains;
use crate::timing::StepTimer;
use cu29::prelude::*;
use std::f32::consts::PI;

/// Gap above which the axis restarts from a clean integrator.
const PID_STALE_MS: u64 = 1_000;

/// Where the integral gain is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegralForm {
    /// `integrator += error * ki * dt`, the integrator is in output units.
    Accumulated,
    /// `integrator += error * dt`, scaled by `ki` on output so gain scheduling applies to it.
    Scaled,
}

/// Contribution of each term.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PidTerms {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl PidTerms {
    pub fn sum(&self) -> f32 {
        self.p + self.i + self.d
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    pub integrator: f32,
    last_error: f32,
    /// `None` right after a reset, the next derivative is then suppressed.
    last_derivative: Option<f32>,
    pub(crate) timer: StepTimer,
}

impl PidState {
    pub fn reset(&mut self) {
        self.integrator = 0.0;
        self.last_derivative = None;
    }

    /// Run one step on `error` with already scheduled gains.
    pub fn step(
        &mut self,
        now: CuTime,
        error: f32,
        gains: PidGains,
        imax: f32,
        d_hz: f32,
        form: IntegralForm,
    ) -> PidTerms {
        let dt_ms = match self.timer.step_ms(now) {
            Some(dt) if dt <= PID_STALE_MS => dt,
            _ => {
                self.reset();
                0
            }
        };
        let dt = dt_ms as f32 / 1000.0;
        let imax = imax.max(0.0);

        let mut terms = PidTerms {
            p: gains.kp * error,
            ..Default::default()
        };

        if gains.kd != 0.0 && dt_ms > 0 {
            let (raw, last) = match self.last_derivative {
                Some(last) => ((error - self.last_error) / dt, last),
                None => (0.0, 0.0),
            };
            let derivative = if d_hz > 0.0 {
                let rc = 1.0 / (2.0 * PI * d_hz);
                last + (dt / (rc + dt)) * (raw - last)
            } else {
                raw
            };
            self.last_error = error;
            self.last_derivative = Some(derivative);
            terms.d = gains.kd * derivative;
        }

        if gains.ki != 0.0 && dt_ms > 0 {
            terms.i = match form {
                IntegralForm::Accumulated => {
                    self.integrator = (self.integrator + error * gains.ki * dt).clamp(-imax, imax);
                    self.integrator
                }
                IntegralForm::Scaled => {
                    self.integrator = (self.integrator + error * dt).clamp(-imax, imax);
                    gains.ki * self.integrator
                }
            };
        }

        terms
    }
}
