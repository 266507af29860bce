use std::time::Duration;

/// Ticks per second.
pub const TICK_RATE: u64 = 1000;

/// One tick, during which every channel moves one chunk.
pub const TICK_PERIOD: Duration = Duration::from_micros(1_000_000 / TICK_RATE);

pub const DEBUG_GENERAL: u32 = 1 << 0;
pub const DEBUG_TICKS: u32 = 1 << 1;

/// Debug verbosity bits.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct DebugFlags(pub u32);

impl DebugFlags {
    pub fn general(&self) -> bool {
        self.0 & DEBUG_GENERAL != 0
    }

    /// Log a heartbeat every few thousand ticks.
    pub fn ticks(&self) -> bool {
        self.0 & DEBUG_TICKS != 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopConfig {
    /// Pairs of spans looped to each other.
    pub loop_pairs: usize,

    /// Pairs of tap spans. Tap span `k` watches loop span `k`.
    pub taps: usize,

    pub debug: DebugFlags,
    pub period: Duration,

    /// Ask the OS for real-time priority on the tick thread.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            loop_pairs: 1,
            taps: 1,
            debug: DebugFlags::default(),
            period: TICK_PERIOD,
            realtime: false,
        }
    }
}

impl LoopConfig {
    pub fn new(loop_pairs: usize, taps: usize) -> Self {
        Self {
            loop_pairs,
            taps,
            ..Self::default()
        }
    }

    /// Total spans requested, or `None` if the count does not fit a `usize`.
    pub fn span_count(&self) -> Option<usize> {
        self.loop_pairs.checked_add(self.taps)?.checked_mul(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = LoopConfig::default();
        assert_eq!(c.loop_pairs, 1);
        assert_eq!(c.taps, 1);
        assert_eq!(c.period, Duration::from_millis(1));
        assert_eq!(c.span_count(), Some(4));
    }

    #[test]
    fn span_count_overflow() {
        assert_eq!(LoopConfig::new(usize::MAX, 1).span_count(), None);
        assert_eq!(LoopConfig::new(usize::MAX / 2, usize::MAX / 2).span_count(), None);
    }

    #[test]
    fn debug_bits() {
        assert!(!DebugFlags(0).general());
        assert!(DebugFlags(DEBUG_GENERAL).general());
        assert!(!DebugFlags(DEBUG_GENERAL).ticks());
        assert!(DebugFlags(DEBUG_GENERAL | DEBUG_TICKS).ticks());
    }
}
