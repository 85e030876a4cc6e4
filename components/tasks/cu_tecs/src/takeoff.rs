use crate::config::TecsConfig;
use crate::limits::ControlLimits;
use crate::stage::StagePolicy;
use cu_tecs_payloads::TecsFlags;

/// Latch the takeoff as complete once clear of the fixed height window or well above takeoff speed.
/// Returns true on the cycle the latch fires.
pub fn update_takeoff_complete(
    flags: &mut TecsFlags,
    config: &TecsConfig,
    height: f32,
    tas: f32,
) -> bool {
    let window = config.fix_height * config.takeoff_window.clamp(1.0, 2.0);
    if !flags.takeoff_complete && (height > window || tas > config.takeoff_speed * 2.0) {
        flags.takeoff_complete = true;
        return true;
    }
    false
}

/// Latch once the climb-out speed target is reached, full power is no longer forced after that.
pub fn update_reached_speed_takeoff(
    flags: &mut TecsFlags,
    policy: &StagePolicy,
    tas: f32,
    tas_dem_adj: f32,
) {
    if policy.climbout && !flags.reached_speed_takeoff && tas >= tas_dem_adj {
        flags.reached_speed_takeoff = true;
    }
}

/// Fixed pitch and throttle used until the takeoff completes: level below takeoff speed, then
/// the takeoff pitch.
pub fn takeoff_hold(config: &TecsConfig, limits: &ControlLimits, tas: f32) -> (f32, f32) {
    let pitch = if tas < config.takeoff_speed {
        0.0
    } else {
        limits.clamp_pitch(config.takeoff_pitch_deg.to_radians())
    };
    (pitch, limits.clamp_throttle(config.takeoff_throttle))
}
