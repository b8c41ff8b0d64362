//! Resettable microsecond clock and the periodic render trigger.
//!
//! Two time bases are in play. The free-running [`TimeSource`] drives all
//! interval arithmetic (debounce windows, the render period) and is never
//! reset. The epoch-relative reading from [`ResetClock::now`] is what gets
//! reported to the host, and the `T` command moves its epoch.
//!
//! Sync exchange, host clock on the left:
//!
//! ```text
//!   T1  host sends 'T'        ->  device reads it, resets epoch (T1')
//!   T3  host reads reply      <-  device writes elapsed since T1' (T2, ~0)
//! ```
//!
//! The host then reads any later timestamp as `T1 + latency + elapsed`.

use log::debug;

use crate::hal::TimeSource;

pub struct ResetClock<T> {
    source: T,
    epoch: u32,
}

impl<T: TimeSource> ResetClock<T> {
    /// Start a clock whose epoch is the moment of construction.
    pub fn new(mut source: T) -> Self {
        let epoch = source.micros();
        Self { source, epoch }
    }

    /// Microseconds since the last reset. Wraps after ~71 minutes.
    pub fn now(&mut self) -> u32 {
        self.source.micros().wrapping_sub(self.epoch)
    }

    /// Move the epoch to this instant.
    pub fn reset(&mut self) {
        self.epoch = self.source.micros();
        debug!("clock epoch reset at tick {}", self.epoch);
    }

    /// Raw free-running reading, unaffected by resets.
    pub fn ticks(&mut self) -> u32 {
        self.source.micros()
    }
}

/// Fires once per period, advancing by exactly one period each time so that
/// loop jitter never accumulates into phase drift.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period_us: u32,
    last: u32,
}

impl PeriodicTimer {
    pub const fn new(period_us: u32, now: u32) -> Self {
        Self {
            period_us,
            last: now,
        }
    }

    /// True if a period boundary has passed since the last firing.
    ///
    /// After a stall the timer fires on consecutive polls until it has
    /// caught up.
    pub fn poll(&mut self, now: u32) -> bool {
        if now.wrapping_sub(self.last) >= self.period_us {
            self.last = self.last.wrapping_add(self.period_us);
            true
        } else {
            false
        }
    }
}

/// Absolute point on the free-running counter after which a wait gives up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: u32,
    timeout_us: u32,
}

impl Deadline {
    pub const fn after(start: u32, timeout_us: u32) -> Self {
        Self { start, timeout_us }
    }

    pub fn expired(&self, now: u32) -> bool {
        now.wrapping_sub(self.start) >= self.timeout_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClock;

    #[test]
    fn test_now_counts_from_construction() {
        let source = FakeClock::new(5_000, 0);
        let handle = source.clone();
        let mut clock = ResetClock::new(source);
        handle.advance(250);
        assert_eq!(clock.now(), 250);
        assert_eq!(clock.ticks(), 5_250);
    }

    #[test]
    fn test_reset_then_read_is_near_zero() {
        // Each read costs a few µs, as a real counter would
        let source = FakeClock::new(123_456, 3);
        let mut clock = ResetClock::new(source);
        clock.reset();
        let elapsed = clock.now();
        assert!(elapsed < 1_000, "elapsed {elapsed}");
    }

    #[test]
    fn test_monotonic_between_resets() {
        let source = FakeClock::new(0, 7);
        let mut clock = ResetClock::new(source);
        let mut last = clock.now();
        for _ in 0..1_000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_now_across_counter_wrap() {
        let source = FakeClock::new(u32::MAX - 100, 0);
        let handle = source.clone();
        let mut clock = ResetClock::new(source);
        handle.advance(300);
        assert_eq!(clock.now(), 300);
    }

    #[test]
    fn test_periodic_timer_keeps_phase() {
        let mut timer = PeriodicTimer::new(10_000, 0);
        assert!(!timer.poll(9_999));
        // Late by 3 ms: fires, but the next boundary stays at 20_000
        assert!(timer.poll(13_000));
        assert!(!timer.poll(19_999));
        assert!(timer.poll(20_000));
    }

    #[test]
    fn test_periodic_timer_catches_up_after_stall() {
        let mut timer = PeriodicTimer::new(10_000, 0);
        let fired = (0..5).filter(|_| timer.poll(35_000)).count();
        assert_eq!(fired, 3);
    }

    #[test]
    fn test_deadline() {
        let deadline = Deadline::after(u32::MAX - 10, 100);
        assert!(!deadline.expired(u32::MAX));
        assert!(!deadline.expired(88));
        assert!(deadline.expired(89));
    }
}
