//! Tuning parameters of the controller and the airframe limits it shares with the rest of
//! the autopilot.

use cu29::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed gains of one PID axis, expressed at 1 m/s for the pitch axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

/// Which PID terms are dropped above the bank angle threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BankDisableLevel {
    #[default]
    None,
    P,
    PD,
    PID,
}

impl From<u8> for BankDisableLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => BankDisableLevel::None,
            1 => BankDisableLevel::P,
            2 => BankDisableLevel::PD,
            _ => BankDisableLevel::PID,
        }
    }
}

/// Vehicle wide limits, percentages are of full throttle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirframeParams {
    pub airspeed_min: f32,
    pub airspeed_max: f32,
    pub stall_prevention: bool,
    pub throttle_cruise: f32,
    pub throttle_max: f32,
    pub throttle_min: f32,
    /// Replaces `throttle_max` while climbing out when non zero.
    pub takeoff_throttle_max: f32,
    /// Percent of the throttle range per second, 0 disables slewing.
    pub throttle_slewrate: f32,
    pub pitch_limit_max_deg: f32,
    pub pitch_limit_min_deg: f32,
}

impl Default for AirframeParams {
    fn default() -> Self {
        Self {
            airspeed_min: 9.0,
            airspeed_max: 22.0,
            stall_prevention: true,
            throttle_cruise: 45.0,
            throttle_max: 75.0,
            throttle_min: 0.0,
            takeoff_throttle_max: 0.0,
            throttle_slewrate: 100.0,
            pitch_limit_max_deg: 20.0,
            pitch_limit_min_deg: -25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TecsConfig {
    /// Best climb rate at max throttle and cruise airspeed, m/s.
    pub max_climb_rate: f32,
    /// Sink rate at min throttle, m/s.
    pub min_sink_rate: f32,
    pub time_const: f32,
    pub thr_damp: f32,
    pub integ_gain: f32,
    /// Vertical acceleration limit, m/s².
    pub vert_acc_lim: f32,
    /// Cross-over frequency of the height complementary filter, rad/s.
    pub hgt_omega: f32,
    /// Cross-over frequency of the airspeed complementary filter, rad/s.
    pub spd_omega: f32,
    pub roll_comp: f32,
    /// 0 is pure height priority, 2 pure speed priority.
    pub spd_weight: f32,
    pub ptch_damp: f32,
    /// 0 falls back to the airframe limit.
    pub pitch_max_deg: f32,
    /// 0 falls back to the airframe limit.
    pub pitch_min_deg: f32,
    pub synthetic_airspeed: bool,
    /// Offset added to both potential energies so they stay positive.
    pub energy_bias: f32,
    /// Height held by the controller, metres.
    pub fix_height: f32,
    pub pitch_pid: PidGains,
    pub throttle_pid: PidGains,
    pub imax: f32,
    /// Derivative filter cutoff of both PID axes, Hz.
    pub d_hz: f32,
    pub pitch_pid_enable: bool,
    pub throttle_pid_enable: bool,
    /// Pass the throttle nudge through even with an airspeed estimate.
    pub manual_throttle: bool,
    pub pitch_ff_gain: f32,
    pub pitch_roll_ff_gain: f32,
    pub test_mode: u8,
    pub bank_pid_disable: BankDisableLevel,
    pub bank_disable_angle_deg: f32,
    pub takeoff_speed: f32,
    pub takeoff_pitch_deg: f32,
    /// Fraction of `fix_height` above which takeoff is complete.
    pub takeoff_window: f32,
    pub takeoff_throttle: f32,
    pub takeoff_hold: bool,
    /// Enables the underspeed and bad descent detectors.
    pub envelope_protection: bool,
    pub dispatch_rate_hz: f32,
    pub airframe: AirframeParams,
}

impl Default for TecsConfig {
    fn default() -> Self {
        Self {
            max_climb_rate: 5.0,
            min_sink_rate: 2.0,
            time_const: 5.0,
            thr_damp: 0.5,
            integ_gain: 0.1,
            vert_acc_lim: 7.0,
            hgt_omega: 3.0,
            spd_omega: 2.0,
            roll_comp: 10.0,
            spd_weight: 1.0,
            ptch_damp: 0.0,
            pitch_max_deg: 0.0,
            pitch_min_deg: 0.0,
            synthetic_airspeed: false,
            energy_bias: 0.0,
            fix_height: 0.0,
            pitch_pid: PidGains::default(),
            throttle_pid: PidGains::default(),
            imax: 100.0,
            d_hz: 20.0,
            pitch_pid_enable: false,
            throttle_pid_enable: false,
            manual_throttle: false,
            pitch_ff_gain: 0.0,
            pitch_roll_ff_gain: 0.0,
            test_mode: 0,
            bank_pid_disable: BankDisableLevel::None,
            bank_disable_angle_deg: 0.0,
            takeoff_speed: 3.0,
            takeoff_pitch_deg: 8.0,
            takeoff_window: 1.15,
            takeoff_throttle: 0.75,
            takeoff_hold: false,
            envelope_protection: false,
            dispatch_rate_hz: 10.0,
            airframe: AirframeParams::default(),
        }
    }
}

impl TecsConfig {
    /// Time constant with its 0.1 s floor.
    pub fn time_constant(&self) -> f32 {
        self.time_const.max(0.1)
    }

    /// Integrator gain shared by the throttle and pitch energy laws.
    pub fn integrator_gain(&self) -> f32 {
        self.integ_gain
    }

    pub fn cruise_throttle(&self) -> f32 {
        self.airframe.throttle_cruise / 100.0
    }

    /// Build a configuration from a Copper task config, keys missing from it keep their default.
    pub fn from_component_config(config: &ComponentConfig) -> CuResult<Self> {
        let d = Self::default();
        let a = d.airframe;
        let airframe = AirframeParams {
            airspeed_min: getcfg(config, "airspeed_min", a.airspeed_min),
            airspeed_max: getcfg(config, "airspeed_max", a.airspeed_max),
            stall_prevention: config
                .get::<bool>("stall_prevention")
                .unwrap_or(a.stall_prevention),
            throttle_cruise: getcfg(config, "throttle_cruise", a.throttle_cruise),
            throttle_max: getcfg(config, "throttle_max", a.throttle_max),
            throttle_min: getcfg(config, "throttle_min", a.throttle_min),
            takeoff_throttle_max: getcfg(config, "takeoff_throttle_max", a.takeoff_throttle_max),
            throttle_slewrate: getcfg(config, "throttle_slewrate", a.throttle_slewrate),
            pitch_limit_max_deg: getcfg(config, "pitch_limit_max", a.pitch_limit_max_deg),
            pitch_limit_min_deg: getcfg(config, "pitch_limit_min", a.pitch_limit_min_deg),
        };

        let tecs = Self {
            max_climb_rate: getcfg(config, "clmb_max", d.max_climb_rate),
            min_sink_rate: getcfg(config, "sink_min", d.min_sink_rate),
            time_const: getcfg(config, "time_const", d.time_const),
            thr_damp: getcfg(config, "thr_damp", d.thr_damp),
            integ_gain: getcfg(config, "integ_gain", d.integ_gain),
            vert_acc_lim: getcfg(config, "vert_acc", d.vert_acc_lim),
            hgt_omega: getcfg(config, "hgt_omega", d.hgt_omega),
            spd_omega: getcfg(config, "spd_omega", d.spd_omega),
            roll_comp: getcfg(config, "rll2thr", d.roll_comp),
            spd_weight: getcfg(config, "spdweight", d.spd_weight),
            ptch_damp: getcfg(config, "ptch_damp", d.ptch_damp),
            pitch_max_deg: getcfg(config, "pitch_max", d.pitch_max_deg),
            pitch_min_deg: getcfg(config, "pitch_min", d.pitch_min_deg),
            synthetic_airspeed: getflag(config, "synairspeed", d.synthetic_airspeed),
            energy_bias: getcfg(config, "max_height", d.energy_bias),
            fix_height: getcfg(config, "fix_height", d.fix_height),
            pitch_pid: PidGains {
                kp: getcfg(config, "pch_kp_0", 0.0),
                ki: getcfg(config, "pch_ki_0", 0.0),
                kd: getcfg(config, "pch_kd_0", 0.0),
            },
            throttle_pid: PidGains {
                kp: getcfg(config, "tht_kp_0", 0.0),
                ki: getcfg(config, "tht_ki_0", 0.0),
                kd: getcfg(config, "tht_kd_0", 0.0),
            },
            imax: getcfg(config, "imax", d.imax),
            d_hz: getcfg(config, "d_hz", d.d_hz),
            pitch_pid_enable: getflag(config, "pch_pid", d.pitch_pid_enable),
            throttle_pid_enable: getflag(config, "tht_pid", d.throttle_pid_enable),
            manual_throttle: getflag(config, "tht_frce", d.manual_throttle),
            pitch_ff_gain: getcfg(config, "pch_ffgn", d.pitch_ff_gain),
            pitch_roll_ff_gain: getcfg(config, "pchrll_ff", d.pitch_roll_ff_gain),
            test_mode: config.get::<u8>("test").unwrap_or(d.test_mode),
            bank_pid_disable: config
                .get::<u8>("bnkdsb_pid")
                .map(BankDisableLevel::from)
                .unwrap_or(d.bank_pid_disable),
            bank_disable_angle_deg: getcfg(config, "bnkdsb_ang", d.bank_disable_angle_deg),
            takeoff_speed: getcfg(config, "tkoff_spd", d.takeoff_speed),
            takeoff_pitch_deg: getcfg(config, "tkoff_ptch", d.takeoff_pitch_deg),
            takeoff_window: getcfg(config, "tkoff_wdw", d.takeoff_window),
            takeoff_throttle: getcfg(config, "tkoff_tht", d.takeoff_throttle),
            takeoff_hold: config.get::<bool>("takeoff_hold").unwrap_or(d.takeoff_hold),
            envelope_protection: config
                .get::<bool>("envelope_protection")
                .unwrap_or(d.envelope_protection),
            dispatch_rate_hz: getcfg(config, "dispatch_rate_hz", d.dispatch_rate_hz),
            airframe,
        };
        tecs.validate()?;
        Ok(tecs)
    }

    /// Reject non finite gains and ranges that would leave the controller without authority.
    pub fn validate(&self) -> CuResult<()> {
        let a = &self.airframe;
        let scalars = [
            ("clmb_max", self.max_climb_rate),
            ("sink_min", self.min_sink_rate),
            ("time_const", self.time_const),
            ("thr_damp", self.thr_damp),
            ("integ_gain", self.integ_gain),
            ("vert_acc", self.vert_acc_lim),
            ("hgt_omega", self.hgt_omega),
            ("spd_omega", self.spd_omega),
            ("rll2thr", self.roll_comp),
            ("spdweight", self.spd_weight),
            ("ptch_damp", self.ptch_damp),
            ("pitch_max", self.pitch_max_deg),
            ("pitch_min", self.pitch_min_deg),
            ("max_height", self.energy_bias),
            ("fix_height", self.fix_height),
            ("pch_kp_0", self.pitch_pid.kp),
            ("pch_ki_0", self.pitch_pid.ki),
            ("pch_kd_0", self.pitch_pid.kd),
            ("tht_kp_0", self.throttle_pid.kp),
            ("tht_ki_0", self.throttle_pid.ki),
            ("tht_kd_0", self.throttle_pid.kd),
            ("imax", self.imax),
            ("d_hz", self.d_hz),
            ("pch_ffgn", self.pitch_ff_gain),
            ("pchrll_ff", self.pitch_roll_ff_gain),
            ("bnkdsb_ang", self.bank_disable_angle_deg),
            ("tkoff_spd", self.takeoff_speed),
            ("tkoff_ptch", self.takeoff_pitch_deg),
            ("tkoff_wdw", self.takeoff_window),
            ("tkoff_tht", self.takeoff_throttle),
            ("dispatch_rate_hz", self.dispatch_rate_hz),
            ("airspeed_min", a.airspeed_min),
            ("airspeed_max", a.airspeed_max),
            ("throttle_cruise", a.throttle_cruise),
            ("throttle_max", a.throttle_max),
            ("throttle_min", a.throttle_min),
            ("takeoff_throttle_max", a.takeoff_throttle_max),
            ("throttle_slewrate", a.throttle_slewrate),
            ("pitch_limit_max", a.pitch_limit_max_deg),
            ("pitch_limit_min", a.pitch_limit_min_deg),
        ];
        if let Some((name, value)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("TECS parameter '{name}' is not finite ({value})").into());
        }

        if self.max_climb_rate + self.min_sink_rate <= 0.0 {
            return Err(CuError::from(
                "'clmb_max' + 'sink_min' must be positive, the energy rate envelope is empty.",
            ));
        }
        if a.throttle_max < a.throttle_min {
            return Err(format!(
                "'throttle_max' ({}) is below 'throttle_min' ({})",
                a.throttle_max, a.throttle_min
            )
            .into());
        }
        if a.throttle_max < 0.0 {
            return Err(CuError::from("'throttle_max' must not be negative."));
        }
        if a.takeoff_throttle_max != 0.0 && a.takeoff_throttle_max < a.throttle_min {
            return Err(format!(
                "'takeoff_throttle_max' ({}) is below 'throttle_min' ({})",
                a.takeoff_throttle_max, a.throttle_min
            )
            .into());
        }
        if a.throttle_slewrate < 0.0 {
            return Err(CuError::from("'throttle_slewrate' must not be negative."));
        }
        if a.pitch_limit_max_deg < a.pitch_limit_min_deg {
            return Err(format!(
                "'pitch_limit_max' ({}) is below 'pitch_limit_min' ({})",
                a.pitch_limit_max_deg, a.pitch_limit_min_deg
            )
            .into());
        }
        if a.airspeed_min <= 0.0 || a.airspeed_max <= 0.0 {
            return Err(CuError::from("'airspeed_min' and 'airspeed_max' must be positive."));
        }
        if self.pitch_max_deg > 0.0 && self.pitch_max_deg < a.pitch_limit_min_deg {
            return Err(format!(
                "'pitch_max' ({}) is below 'pitch_limit_min' ({})",
                self.pitch_max_deg, a.pitch_limit_min_deg
            )
            .into());
        }
        if self.pitch_min_deg < 0.0 && self.pitch_min_deg > a.pitch_limit_max_deg {
            return Err(format!(
                "'pitch_min' ({}) is above 'pitch_limit_max' ({})",
                self.pitch_min_deg, a.pitch_limit_max_deg
            )
            .into());
        }
        if self.vert_acc_lim <= 0.0 {
            return Err(CuError::from("'vert_acc' must be positive."));
        }
        if self.imax < 0.0 {
            return Err(CuError::from("'imax' must not be negative."));
        }
        if self.dispatch_rate_hz <= 0.0 {
            return Err(CuError::from("'dispatch_rate_hz' must be positive."));
        }
        Ok(())
    }
}

// Small helper because we do this again and again
fn getcfg(config: &ComponentConfig, key: &str, default: f32) -> f32 {
    if let Some(value) = config.get::<f64>(key) {
        value as f32
    } else {
        default
    }
}

// Boolean switches are stored as numbers in the parameter tables, anything >= 1 is on.
fn getflag(config: &ComponentConfig, key: &str, default: bool) -> bool {
    match config.get::<f64>(key) {
        Some(value) => value >= 1.0,
        None => default,
    }
}
