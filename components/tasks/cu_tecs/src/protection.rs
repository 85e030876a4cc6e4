//! Underspeed and bad descent detectors. Both latch into the status flags and, while set,
//! pin the speed demand to the envelope minimum.

use crate::stage::StagePolicy;
use cu29::prelude::*;
use cu_tecs_payloads::TecsFlags;

/// Time spent recovering before an underspeed latch may clear.
const UNDERSPEED_CLEAR_NS: u64 = 3_000_000_000;

/// Total energy error above which a descent is considered bad, about 20 m of height.
const BAD_DESCENT_STE_ERROR: f32 = 200.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeProtection {
    underspeed_start: Option<CuTime>,
}

impl EnvelopeProtection {
    #[allow(clippy::too_many_arguments)]
    pub fn detect_underspeed(
        &mut self,
        now: CuTime,
        flags: &mut TecsFlags,
        policy: &StagePolicy,
        tas: f32,
        tas_min: f32,
        height: f32,
        hgt_dem_adj: f32,
        throttle_dem: f32,
        thr_max: f32,
    ) {
        let recovered_long_enough = self.underspeed_start.map_or(true, |start| {
            now.as_nanos().saturating_sub(start.as_nanos()) > UNDERSPEED_CLEAR_NS
        });
        if flags.underspeed && tas >= tas_min * 1.15 && recovered_long_enough {
            flags.underspeed = false;
        }

        let too_slow = tas < tas_min * 0.9;
        if !policy.underspeed_allowed {
            flags.underspeed = false;
        } else if (too_slow && throttle_dem >= thr_max * 0.95) || (height < hgt_dem_adj && flags.underspeed)
        {
            flags.underspeed = true;
            if too_slow {
                self.underspeed_start = Some(now);
            }
        } else {
            flags.underspeed = false;
        }
    }

    /// Latch when the demanded airspeed cannot be held without losing energy at high throttle.
    pub fn detect_bad_descent(
        &self,
        flags: &mut TecsFlags,
        ste_error: f32,
        ste_dot: f32,
        throttle_dem: f32,
        thr_max: f32,
    ) {
        let entering = !flags.underspeed
            && ste_error > BAD_DESCENT_STE_ERROR
            && ste_dot < 0.0
            && throttle_dem >= thr_max * 0.9;
        let holding = flags.bad_descent && !flags.underspeed && ste_error > 0.0;
        flags.bad_descent = entering || holding;
    }

    pub fn reset(&mut self) {
        self.underspeed_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cu_tecs_payloads::FlightStage;

    fn at_s(s: f32) -> CuTime {
        CuTime::from((s * 1e9) as u64)
    }

    #[test]
    fn underspeed_latches_at_full_throttle_and_holds_three_seconds() {
        let policy = StagePolicy::for_stage(FlightStage::Normal);
        let mut prot = EnvelopeProtection::default();
        let mut flags = TecsFlags::default();

        prot.detect_underspeed(at_s(1.0), &mut flags, &policy, 7.0, 9.0, 10.0, 10.0, 0.75, 0.75);
        assert!(flags.underspeed);

        // fast again but below the height demand and inside the hold time
        prot.detect_underspeed(at_s(2.0), &mut flags, &policy, 12.0, 9.0, 5.0, 10.0, 0.75, 0.75);
        assert!(flags.underspeed, "below height demand keeps the latch");

        prot.detect_underspeed(at_s(4.5), &mut flags, &policy, 12.0, 9.0, 5.0, 10.0, 0.75, 0.75);
        assert!(!flags.underspeed);
    }

    #[test]
    fn underspeed_needs_high_throttle() {
        let policy = StagePolicy::for_stage(FlightStage::Normal);
        let mut prot = EnvelopeProtection::default();
        let mut flags = TecsFlags::default();
        prot.detect_underspeed(at_s(1.0), &mut flags, &policy, 7.0, 9.0, 10.0, 10.0, 0.5, 0.75);
        assert!(!flags.underspeed);
    }

    #[test]
    fn never_underspeed_in_vtol() {
        let policy = StagePolicy::for_stage(FlightStage::Vtol);
        let mut prot = EnvelopeProtection::default();
        let mut flags = TecsFlags {
            underspeed: true,
            ..Default::default()
        };
        prot.detect_underspeed(at_s(1.0), &mut flags, &policy, 1.0, 9.0, 0.0, 10.0, 0.75, 0.75);
        assert!(!flags.underspeed);
    }

    #[test]
    fn bad_descent_enters_and_holds() {
        let prot = EnvelopeProtection::default();
        let mut flags = TecsFlags::default();
        prot.detect_bad_descent(&mut flags, 250.0, -1.0, 0.7, 0.75);
        assert!(flags.bad_descent);
        prot.detect_bad_descent(&mut flags, 10.0, 1.0, 0.2, 0.75);
        assert!(flags.bad_descent);
        prot.detect_bad_descent(&mut flags, -1.0, 1.0, 0.2, 0.75);
        assert!(!flags.bad_descent);
    }

    #[test]
    fn underspeed_blocks_bad_descent() {
        let prot = EnvelopeProtection::default();
        let mut flags = TecsFlags {
            underspeed: true,
            ..Default::default()
        };
        prot.detect_bad_descent(&mut flags, 250.0, -1.0, 0.75, 0.75);
        assert!(!flags.bad_descent);
    }
}
