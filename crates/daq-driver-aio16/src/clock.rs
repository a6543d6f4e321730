//! Millisecond-of-day timestamps.
//!
//! Scan records carry a time-of-day tag in milliseconds. The tag wraps at
//! midnight, so all arithmetic here is modular over [`MSECS_PER_DAY`].

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds in one day.
pub const MSECS_PER_DAY: u32 = 86_400_000;

/// Milliseconds in one second.
pub const MSECS_PER_SEC: u32 = 1_000;

/// A time-of-day tag in milliseconds since midnight UTC.
///
/// Ordering by raw value is not meaningful across midnight; use
/// [`TimeTag::millis_since`] for wrap-aware intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeTag(u32);

impl TimeTag {
    /// Build a tag from a millisecond count, reducing modulo one day.
    pub fn from_msecs(msecs: u32) -> Self {
        Self(msecs % MSECS_PER_DAY)
    }

    /// Milliseconds since midnight.
    pub fn msecs(self) -> u32 {
        self.0
    }

    /// Step the tag back by `msecs`, wrapping across midnight.
    pub fn back(self, msecs: u32) -> Self {
        let msecs = msecs % MSECS_PER_DAY;
        if self.0 < msecs {
            Self(self.0 + MSECS_PER_DAY - msecs)
        } else {
            Self(self.0 - msecs)
        }
    }

    /// Step the tag forward by `msecs`, wrapping across midnight.
    pub fn forward(self, msecs: u32) -> Self {
        Self((self.0 + msecs % MSECS_PER_DAY) % MSECS_PER_DAY)
    }

    /// Wrap-aware interval from `earlier` to `self`, in milliseconds.
    pub fn millis_since(self, earlier: TimeTag) -> u32 {
        (self.0 + MSECS_PER_DAY - earlier.0) % MSECS_PER_DAY
    }
}

/// Source of millisecond-of-day timestamps for interrupt stamping.
pub trait MsClock: Send + Sync {
    /// Current time of day.
    fn now(&self) -> TimeTag;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMsClock;

impl MsClock for SystemMsClock {
    fn now(&self) -> TimeTag {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        TimeTag::from_msecs((since_epoch.as_millis() % u128::from(MSECS_PER_DAY)) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_wraps_across_midnight() {
        let tt = TimeTag::from_msecs(100);
        assert_eq!(tt.back(250).msecs(), MSECS_PER_DAY - 150);
    }

    #[test]
    fn forward_wraps_across_midnight() {
        let tt = TimeTag::from_msecs(MSECS_PER_DAY - 10);
        assert_eq!(tt.forward(25).msecs(), 15);
    }

    #[test]
    fn millis_since_spans_midnight() {
        let before = TimeTag::from_msecs(MSECS_PER_DAY - 100);
        let after = TimeTag::from_msecs(400);
        assert_eq!(after.millis_since(before), 500);
        assert_eq!(before.millis_since(before), 0);
    }

    #[test]
    fn from_msecs_reduces_modulo_day() {
        assert_eq!(TimeTag::from_msecs(MSECS_PER_DAY + 7).msecs(), 7);
    }

    #[test]
    fn system_clock_stays_in_range() {
        let tt = SystemMsClock.now();
        assert!(tt.msecs() < MSECS_PER_DAY);
    }
}
