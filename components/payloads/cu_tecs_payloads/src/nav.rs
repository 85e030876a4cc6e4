use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use uom::si::acceleration::meter_per_second_squared;
use uom::si::angle::radian;
use uom::si::f32::{Acceleration, Angle, Length, Velocity};
use uom::si::length::meter;
use uom::si::velocity::meter_per_second;

/// Standard gravity used to convert heights and vertical accelerations into specific energies.
pub const GRAVITY_MSS: f32 = 9.80665;

/// One sample from the attitude and navigation reference.
///
/// Frames follow the aerospace conventions: roll and pitch are body Euler angles,
/// `accel_down` is the earth frame (NED) vertical specific force, so an aircraft at rest
/// reads `-g`, and `accel_forward` is the body X specific force.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavPayload {
    pub roll: Angle,
    pub pitch: Angle,
    /// Height above the navigation origin, positive up.
    pub height: Length,
    /// Vertical velocity, positive up, when the navigation filter provides one.
    pub climb_rate: Option<Velocity>,
    pub accel_down: Acceleration,
    pub accel_forward: Acceleration,
    /// Equivalent to true airspeed ratio.
    pub eas2tas: f32,
    pub airspeed_sensor_enabled: bool,
    /// Equivalent airspeed estimate, measured or synthetic.
    pub airspeed: Option<Velocity>,
}

impl Default for NavPayload {
    fn default() -> Self {
        Self {
            roll: Angle::new::<radian>(0.0),
            pitch: Angle::new::<radian>(0.0),
            height: Length::new::<meter>(0.0),
            climb_rate: None,
            accel_down: Acceleration::new::<meter_per_second_squared>(-GRAVITY_MSS),
            accel_forward: Acceleration::new::<meter_per_second_squared>(0.0),
            eas2tas: 1.0,
            airspeed_sensor_enabled: false,
            airspeed: None,
        }
    }
}

impl NavPayload {
    /// Build a navigation sample from plain SI scalars.
    ///
    /// * `roll_pitch_rad` - body roll and pitch in radians.
    /// * `height_m` - height above origin, positive up.
    /// * `climb_rate_mps` - vertical velocity, positive up, if known.
    /// * `airspeed_mps` - equivalent airspeed, if known.
    pub fn from_raw(
        roll_pitch_rad: [f32; 2],
        height_m: f32,
        climb_rate_mps: Option<f32>,
        airspeed_mps: Option<f32>,
    ) -> Self {
        let [roll, pitch] = roll_pitch_rad.map(Angle::new::<radian>);
        Self {
            roll,
            pitch,
            height: Length::new::<meter>(height_m),
            climb_rate: climb_rate_mps.map(Velocity::new::<meter_per_second>),
            airspeed_sensor_enabled: airspeed_mps.is_some(),
            airspeed: airspeed_mps.map(Velocity::new::<meter_per_second>),
            ..Default::default()
        }
    }

    /// Set the measured accelerations, in m/s².
    pub fn with_accels(mut self, accel_down_mss: f32, accel_forward_mss: f32) -> Self {
        self.accel_down = Acceleration::new::<meter_per_second_squared>(accel_down_mss);
        self.accel_forward = Acceleration::new::<meter_per_second_squared>(accel_forward_mss);
        self
    }

    pub fn roll_rad(&self) -> f32 {
        self.roll.get::<radian>()
    }

    pub fn pitch_rad(&self) -> f32 {
        self.pitch.get::<radian>()
    }

    pub fn height_m(&self) -> f32 {
        self.height.get::<meter>()
    }

    pub fn climb_rate_mps(&self) -> Option<f32> {
        self.climb_rate.map(|v| v.get::<meter_per_second>())
    }

    pub fn accel_down_mss(&self) -> f32 {
        self.accel_down.get::<meter_per_second_squared>()
    }

    /// Rate of change of airspeed along the flight path, from the body X specific force
    /// and the gravity component along the longitudinal axis.
    pub fn longitudinal_accel_mss(&self) -> f32 {
        self.accel_forward.get::<meter_per_second_squared>() - GRAVITY_MSS * self.pitch_rad().sin()
    }

    /// Horizontal projection of the body Y axis, the cosine of the bank angle for level
    /// pitch. Always positive.
    pub fn cos_bank(&self) -> f32 {
        let lateral_tilt = self.roll_rad().sin() * self.pitch_rad().cos();
        (1.0 - lateral_tilt * lateral_tilt).max(0.0).sqrt()
    }

    /// Equivalent airspeed, only when a sensor or synthetic source produced one.
    pub fn airspeed_mps(&self) -> Option<f32> {
        self.airspeed.map(|v| v.get::<meter_per_second>())
    }
}

impl Encode for NavPayload {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.roll.value, encoder)?;
        Encode::encode(&self.pitch.value, encoder)?;
        Encode::encode(&self.height.value, encoder)?;
        Encode::encode(&self.climb_rate.map(|v| v.value), encoder)?;
        Encode::encode(&self.accel_down.value, encoder)?;
        Encode::encode(&self.accel_forward.value, encoder)?;
        Encode::encode(&self.eas2tas, encoder)?;
        Encode::encode(&self.airspeed_sensor_enabled, encoder)?;
        Encode::encode(&self.airspeed.map(|v| v.value), encoder)?;
        Ok(())
    }
}

impl Decode<()> for NavPayload {
    fn decode<D: Decoder<Context = ()>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let roll = Angle::new::<radian>(Decode::decode(decoder)?);
        let pitch = Angle::new::<radian>(Decode::decode(decoder)?);
        let height = Length::new::<meter>(Decode::decode(decoder)?);
        let climb_rate: Option<f32> = Decode::decode(decoder)?;
        let accel_down = Acceleration::new::<meter_per_second_squared>(Decode::decode(decoder)?);
        let accel_forward = Acceleration::new::<meter_per_second_squared>(Decode::decode(decoder)?);
        let eas2tas = Decode::decode(decoder)?;
        let airspeed_sensor_enabled = Decode::decode(decoder)?;
        let airspeed: Option<f32> = Decode::decode(decoder)?;

        Ok(Self {
            roll,
            pitch,
            height,
            climb_rate: climb_rate.map(Velocity::new::<meter_per_second>),
            accel_down,
            accel_forward,
            eas2tas,
            airspeed_sensor_enabled,
            airspeed: airspeed.map(Velocity::new::<meter_per_second>),
        })
    }
}
