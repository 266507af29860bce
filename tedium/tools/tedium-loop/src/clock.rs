use std::time::{Duration, Instant};

/// Expiry bookkeeping for the tick.
///
/// Expiries sit on a fixed grid, `start + n * period`. Advancing always moves
/// to the next grid point after `now`, so a late wakeup neither drifts the
/// grid nor replays the ticks it slept through.
#[derive(Copy, Clone, Debug)]
pub(crate) struct TickClock {
    expiry: Instant,
    period: Duration,
}

impl TickClock {
    pub(crate) fn start(now: Instant, period: Duration) -> Self {
        assert!(!period.is_zero());

        Self {
            expiry: now + period,
            period,
        }
    }

    pub(crate) fn expiry(&self) -> Instant {
        self.expiry
    }

    /// Move the expiry past `now`, returning how many periods it moved.
    /// Anything over one is ticks that were missed.
    pub(crate) fn forward(&mut self, now: Instant) -> u64 {
        let late = now.saturating_duration_since(self.expiry);
        let overrun = late.as_nanos() / self.period.as_nanos() + 1;

        let advance = self.period.as_nanos().saturating_mul(overrun);
        self.expiry += Duration::from_nanos(u64::try_from(advance).unwrap_or(u64::MAX));

        u64::try_from(overrun).unwrap_or(u64::MAX)
    }
}
