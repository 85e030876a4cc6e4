//! The TECS core: fast estimators plus the dispatch pipeline producing pitch and throttle.

use crate::config::TecsConfig;
use crate::energy::{EnergyRateLimits, SpecificEnergies};
use crate::estimator::{EstimatorState, SpeedEnvelope};
use crate::limits::{ControlLimits, NO_PITCH_LIMIT_DEG};
use crate::pitch::{PitchInputs, PitchLaw};
use crate::recorder::{NullRecorder, TecsRecorder};
use crate::reset::{ControllerState, Reinit, ResetTargets};
use crate::stage::StagePolicy;
use crate::takeoff;
use crate::throttle::{ThrottleInputs, ThrottleLaw};
use crate::timing::StepTimer;
use bincode::{Decode, Encode};
use cu29::prelude::*;
use cu_tecs_payloads::{
    FlightStage, NavPayload, TecsCommandPayload, TecsDiagnostics, TecsFlags, TecsOutputPayload,
};

/// Total energy control system for a single vehicle.
///
/// `update_fast_estimators` is expected at about 50 Hz and `update_pitch_throttle` at the
/// dispatch rate, both from the same thread.
pub struct Tecs {
    config: TecsConfig,
    estimators: EstimatorState,
    state: ControllerState,
    energies: SpecificEnergies,
    envelope: SpeedEnvelope,
    limits: ControlLimits,
    rates: EnergyRateLimits,
    stage: FlightStage,
    cos_phi: f32,
    pitch_max_limit_deg: f32,
    synthetic_once: bool,
    dispatch_timer: StepTimer,
    diagnostics: TecsDiagnostics,
    recorder: Box<dyn TecsRecorder>,
}

impl Tecs {
    /// Build a controller from parameters that are already trusted. The limits stay ordered
    /// either way, use `try_new` to reject inconsistent parameters instead.
    pub fn new(config: TecsConfig) -> Self {
        let rates = EnergyRateLimits::from_config(&config);
        Self {
            config,
            estimators: EstimatorState::default(),
            state: ControllerState::default(),
            energies: SpecificEnergies::default(),
            envelope: SpeedEnvelope::default(),
            limits: ControlLimits::default(),
            rates,
            stage: FlightStage::default(),
            cos_phi: 1.0,
            pitch_max_limit_deg: NO_PITCH_LIMIT_DEG,
            synthetic_once: false,
            dispatch_timer: StepTimer::default(),
            diagnostics: TecsDiagnostics::default(),
            recorder: Box::new(NullRecorder),
        }
    }

    pub fn try_new(config: TecsConfig) -> CuResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Hand every diagnostic record to `recorder`.
    pub fn with_recorder(mut self, recorder: Box<dyn TecsRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn config(&self) -> &TecsConfig {
        &self.config
    }

    /// Swap the parameters, takes effect on the next cycle. Invalid parameters are refused
    /// and the current ones kept.
    pub fn set_config(&mut self, config: TecsConfig) -> CuResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Cap pitch to `±limit_deg` on the next dispatch only.
    pub fn set_pitch_max_limit(&mut self, limit_deg: f32) {
        if limit_deg.is_finite() {
            self.pitch_max_limit_deg = limit_deg.abs().min(NO_PITCH_LIMIT_DEG);
        }
    }

    /// Run the energy throttle law on the next dispatch even without an airspeed sensor.
    pub fn use_synthetic_airspeed_once(&mut self) {
        self.synthetic_once = true;
    }

    pub fn pitch_demand(&self) -> f32 {
        self.state.pitch.pitch_dem
    }

    pub fn throttle_demand(&self) -> f32 {
        self.state.throttle.throttle_dem
    }

    pub fn flags(&self) -> TecsFlags {
        self.state.flags
    }

    pub fn diagnostics(&self) -> &TecsDiagnostics {
        &self.diagnostics
    }

    pub fn limits(&self) -> &ControlLimits {
        &self.limits
    }

    pub fn height_estimate(&self) -> f32 {
        self.estimators.height.height
    }

    pub fn climb_rate(&self) -> f32 {
        self.estimators.height.climb_rate
    }

    pub fn tas_state(&self) -> f32 {
        self.estimators.speed.tas_state
    }

    pub fn ste_error(&self) -> f32 {
        self.state.throttle.ste_error
    }

    /// Advance the height filter and the longitudinal acceleration average.
    pub fn update_fast_estimators(&mut self, now: CuTime, nav: &NavPayload) {
        if self.estimators.update_fast(now, nav, self.config.hgt_omega) {
            debug!("TECS: height estimator restarted at {} m", nav.height_m());
        }
    }

    /// Same as `update_fast_estimators` with height and climb rate from an external estimator.
    pub fn update_fast_estimators_external(
        &mut self,
        now: CuTime,
        nav: &NavPayload,
        climb_rate: f32,
        height: f32,
    ) {
        if self
            .estimators
            .update_fast_external(now, nav, climb_rate, height)
        {
            debug!("TECS: external height estimate restarted at {} m", height);
        }
    }

    /// One dispatch cycle: demands in, clamped pitch (rad) and throttle (fraction) out.
    pub fn update_pitch_throttle(
        &mut self,
        now: CuTime,
        nav: &NavPayload,
        cmd: &TecsCommandPayload,
    ) -> TecsOutputPayload {
        let dt = self.dispatch_timer.step(now);

        if cmd.flight_stage != self.stage {
            info!("TECS: flight stage {:?} -> {:?}", self.stage, cmd.flight_stage);
        }
        self.stage = cmd.flight_stage;
        let policy = StagePolicy::for_stage(self.stage);
        self.state.flags.is_doing_auto_land = false;
        self.state
            .height_demand
            .update(self.config.fix_height, cmd.height_dem_m);

        self.envelope = self.estimators.speed.update(
            now,
            nav,
            &self.config,
            cmd.airspeed_dem_mps,
            cmd.load_factor,
            self.synthetic_once,
            self.estimators.vel_dot,
        );
        let tas = self.estimators.speed.tas_state;

        self.limits = ControlLimits::compute(&self.config, &policy, self.pitch_max_limit_deg);
        self.pitch_max_limit_deg = NO_PITCH_LIMIT_DEG;

        let reinit = Reinit::classify(dt, &policy);
        if reinit == Reinit::Stale {
            debug!("TECS: dispatch idle for {} s, reinitialising", dt);
        }
        let targets = ResetTargets {
            nav_pitch: nav.pitch_rad(),
            tas_dem: self.envelope.tas_dem,
            climbout_pitch_min_deg: cmd.climbout_pitch_min_deg,
        };
        let dt = self.state.initialise(
            reinit,
            dt,
            &self.config,
            &policy,
            &targets,
            &mut self.limits,
        );

        let height = self.estimators.height.height;
        if takeoff::update_takeoff_complete(&mut self.state.flags, &self.config, height, tas) {
            info!("TECS: takeoff complete at {} m, {} m/s", height, tas);
        }

        self.rates = EnergyRateLimits::from_config(&self.config);
        let force_min = self.state.flags.underspeed || self.state.flags.bad_descent;
        self.state.speed_demand.update(
            &self.envelope,
            tas,
            self.rates.ste_dot_max,
            self.rates.ste_dot_min,
            force_min,
        );
        takeoff::update_reached_speed_takeoff(
            &mut self.state.flags,
            &policy,
            tas,
            self.state.speed_demand.tas_dem_adj,
        );

        if self.config.envelope_protection {
            let was_underspeed = self.state.flags.underspeed;
            self.state.protection.detect_underspeed(
                now,
                &mut self.state.flags,
                &policy,
                tas,
                self.envelope.tas_min,
                height,
                self.state.height_demand.hgt_dem_adj,
                self.state.throttle.throttle_dem,
                self.limits.thr_max,
            );
            if was_underspeed != self.state.flags.underspeed {
                info!("TECS: underspeed {} at {} m/s", self.state.flags.underspeed, tas);
            }
        }

        self.energies = SpecificEnergies::compute(
            &self.state.height_demand,
            &self.state.speed_demand,
            height,
            self.estimators.height.climb_rate,
            tas,
            self.estimators.vel_dot,
            self.config.energy_bias,
        );
        self.cos_phi = nav.cos_bank();

        if self.config.takeoff_hold && !self.state.flags.takeoff_complete {
            let (pitch, throttle) = takeoff::takeoff_hold(&self.config, &self.limits, tas);
            self.state.pitch.pitch_dem = pitch;
            self.state.pitch.last_pitch_dem = pitch;
            self.state.throttle.throttle_dem = throttle;
        } else {
            self.run_laws(now, dt, nav, cmd, &policy);
        }

        self.publish(now, nav, cmd)
    }

    fn run_laws(
        &mut self,
        now: CuTime,
        dt: f32,
        nav: &NavPayload,
        cmd: &TecsCommandPayload,
        policy: &StagePolicy,
    ) {
        let tas = self.estimators.speed.tas_state;

        let throttle_law =
            ThrottleLaw::select(&self.config, nav.airspeed_sensor_enabled, self.synthetic_once);
        let throttle_inputs = ThrottleInputs {
            now,
            dt,
            energies: &self.energies,
            rates: self.rates,
            limits: self.limits,
            policy: *policy,
            envelope: self.envelope,
            tas_state: tas,
            tas_dem: self.state.speed_demand.tas_dem,
            cos_phi: self.cos_phi,
            underspeed: self.state.flags.underspeed,
            reached_speed_takeoff: self.state.flags.reached_speed_takeoff,
            throttle_nudge_pct: cmd.throttle_nudge_pct,
        };
        let throttle = throttle_law.update(&mut self.state.throttle, &throttle_inputs, &self.config);
        if throttle_law == ThrottleLaw::Energy {
            self.synthetic_once = false;
        }

        if self.config.envelope_protection {
            self.state.protection.detect_bad_descent(
                &mut self.state.flags,
                self.state.throttle.ste_error,
                self.energies.ste_dot(),
                throttle,
                self.limits.thr_max,
            );
        }

        let pitch_inputs = PitchInputs {
            now,
            dt,
            energies: &self.energies,
            limits: self.limits,
            policy: *policy,
            tas_state: tas,
            height: self.estimators.height.height,
            roll: nav.roll_rad(),
            cos_phi: self.cos_phi,
            airspeed_sensor: nav.airspeed_sensor_enabled,
            underspeed: self.state.flags.underspeed,
        };
        PitchLaw::select(&self.config).update(&mut self.state.pitch, &pitch_inputs, &self.config);
    }

    fn publish(
        &mut self,
        now: CuTime,
        nav: &NavPayload,
        cmd: &TecsCommandPayload,
    ) -> TecsOutputPayload {
        let est = &self.estimators;
        let state = &self.state;
        self.diagnostics = TecsDiagnostics {
            time_us: now.as_nanos() / 1_000,
            height: est.height.height,
            climb_rate: est.height.climb_rate,
            height_dem: state.height_demand.hgt_dem_adj,
            height_rate_dem: state.height_demand.hgt_rate_dem,
            tas_dem_adj: state.speed_demand.tas_dem_adj,
            tas: est.speed.tas_state,
            vel_dot: est.vel_dot,
            integ_thr: state.throttle.integ_thr,
            integ_seb: state.pitch.integ_seb,
            throttle_dem: state.throttle.throttle_dem,
            pitch_dem: state.pitch.pitch_dem,
            tas_rate_dem: state.speed_demand.tas_rate_dem,
            ske_weighting: state.pitch.ske_weighting,
            flags: state.flags.bits(),
            ske_error: self.energies.ske_error(),
            spe_error: self.energies.spe_error(),
            seb_delta: state.pitch.seb_delta,
            load_factor: cmd.load_factor,
            distance_beyond_land_wp: cmd.distance_beyond_land_wp_m,
            height_above_field: cmd.height_above_field_m,
            pitch_pid_integrator: state.pitch.pid.integrator,
            cos_phi: self.cos_phi,
            nav_height: est.height.nav_height,
            nav_climb_rate: est.height.nav_climb_rate,
            accel_down: nav.accel_down_mss(),
        };
        self.recorder.record(&self.diagnostics);

        TecsOutputPayload {
            pitch_dem: self.state.pitch.pitch_dem,
            throttle_dem: self.state.throttle.throttle_dem,
            diagnostics: self.diagnostics,
        }
    }

    /// Persistent states, enough to resume control where a snapshot was taken.
    pub fn snapshot(&self) -> TecsSnapshot {
        let est = &self.estimators;
        let state = &self.state;
        TecsSnapshot {
            height: est.height.height,
            climb_rate: est.height.climb_rate,
            dd_height: est.height.dd_height,
            tas_state: est.speed.tas_state,
            integ_dtas: est.speed.integ_dtas,
            integ_thr: state.throttle.integ_thr,
            last_throttle_dem: state.throttle.last_throttle_dem,
            throttle_dem: state.throttle.throttle_dem,
            integ_seb: state.pitch.integ_seb,
            last_pitch_dem: state.pitch.last_pitch_dem,
            pitch_dem_unc: state.pitch.pitch_dem_unc,
            pitch_dem: state.pitch.pitch_dem,
            tas_dem_adj: state.speed_demand.tas_dem_adj,
            tas_dem_last: state.speed_demand.tas_dem_last,
            throttle_pid_integrator: state.throttle.pid.integrator,
            pitch_pid_integrator: state.pitch.pid.integrator,
            flags: state.flags.bits(),
            fast_last_ns: est.height.timer.last().map(|t| t.as_nanos()),
            dispatch_last_ns: self.dispatch_timer.last().map(|t| t.as_nanos()),
        }
    }

    pub fn restore(&mut self, snapshot: &TecsSnapshot) {
        let fast_last = snapshot.fast_last_ns.map(CuTime::from);
        let dispatch_last = snapshot.dispatch_last_ns.map(CuTime::from);

        let est = &mut self.estimators;
        est.height.height = snapshot.height;
        est.height.climb_rate = snapshot.climb_rate;
        est.height.dd_height = snapshot.dd_height;
        est.height.timer.restore(fast_last);
        est.speed.tas_state = snapshot.tas_state;
        est.speed.integ_dtas = snapshot.integ_dtas;
        est.speed.timer.restore(dispatch_last);

        let state = &mut self.state;
        state.throttle.integ_thr = snapshot.integ_thr;
        state.throttle.last_throttle_dem = snapshot.last_throttle_dem;
        state.throttle.throttle_dem = snapshot.throttle_dem;
        state.throttle.pid.integrator = snapshot.throttle_pid_integrator;
        state.pitch.integ_seb = snapshot.integ_seb;
        state.pitch.last_pitch_dem = snapshot.last_pitch_dem;
        state.pitch.pitch_dem_unc = snapshot.pitch_dem_unc;
        state.pitch.pitch_dem = snapshot.pitch_dem;
        state.pitch.pid.integrator = snapshot.pitch_pid_integrator;
        state.speed_demand.tas_dem_adj = snapshot.tas_dem_adj;
        state.speed_demand.tas_dem_last = snapshot.tas_dem_last;
        state.flags = TecsFlags::from_bits(snapshot.flags);
        self.dispatch_timer.restore(dispatch_last);
    }
}

/// Frozen controller state, see [`Tecs::snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Encode, Decode)]
pub struct TecsSnapshot {
    pub height: f32,
    pub climb_rate: f32,
    pub dd_height: f32,
    pub tas_state: f32,
    pub integ_dtas: f32,
    pub integ_thr: f32,
    pub last_throttle_dem: f32,
    pub throttle_dem: f32,
    pub integ_seb: f32,
    pub last_pitch_dem: f32,
    pub pitch_dem_unc: f32,
    pub pitch_dem: f32,
    pub tas_dem_adj: f32,
    pub tas_dem_last: f32,
    pub throttle_pid_integrator: f32,
    pub pitch_pid_integrator: f32,
    pub flags: u8,
    pub fast_last_ns: Option<u64>,
    pub dispatch_last_ns: Option<u64>,
}
