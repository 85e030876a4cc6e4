use cu29::prelude::*;

/// Gap above which a loop is considered stale and its states are reinitialised.
pub const STALE_DT_S: f32 = 1.0;

/// Tracks the last invocation of one loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepTimer {
    last: Option<CuTime>,
}

impl StepTimer {
    /// Seconds since the previous call, `f32::INFINITY` on the first one.
    /// A clock that goes backwards yields zero.
    pub fn step(&mut self, now: CuTime) -> f32 {
        let dt = match self.last {
            Some(last) => now.as_nanos().saturating_sub(last.as_nanos()) as f32 * 1e-9,
            None => f32::INFINITY,
        };
        self.last = Some(now);
        dt
    }

    /// Whole milliseconds since the previous call, `None` on the first one.
    pub fn step_ms(&mut self, now: CuTime) -> Option<u64> {
        let dt = self
            .last
            .map(|last| now.as_nanos().saturating_sub(last.as_nanos()) / 1_000_000);
        self.last = Some(now);
        dt
    }

    pub fn last(&self) -> Option<CuTime> {
        self.last
    }

    pub fn restore(&mut self, last: Option<CuTime>) {
        self.last = last;
    }
}
