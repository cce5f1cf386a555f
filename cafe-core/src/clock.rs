//! Time sources.

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Supplies the current instant in the service's local offset.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock rendered in a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Wall clock in `offset`.
    #[must_use]
    pub const fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Wall clock east of UTC by `hours`; falls back to UTC when out of
    /// range.
    #[must_use]
    pub fn east_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(utc_offset);
        Self::new(offset)
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

impl Default for SystemClock {
    /// Taipei time (UTC+8).
    fn default() -> Self {
        Self::east_hours(8)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Clock frozen at one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
