//! Opening-hours evaluation.
//!
//! Days use the Sunday-based numbering of the listing source (`0 = Sunday`)
//! and times are minutes since local midnight. Evaluation is fail-closed: a
//! venue is only open when a period positively covers the instant.

use chrono::{Datelike, NaiveDateTime, Timelike};
use thiserror::Error;

/// Minutes in one day.
pub const MINUTES_PER_DAY: u32 = 1440;

const DAYS_PER_WEEK: u32 = 7;
const MINUTES_PER_WEEK: u32 = MINUTES_PER_DAY * DAYS_PER_WEEK;
const ROUND_THE_CLOCK_HOURS: f64 = 24.0;

/// Hours-until-close reported when nothing is known about the schedule.
pub const NEUTRAL_HOURS_UNTIL_CLOSE: f64 = 3.0;

/// One opening interval in the weekly schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    day: u8,
    open: u32,
    close: Option<u32>,
    is_overnight: bool,
}

/// Errors returned by [`Period::new`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpeningHoursError {
    /// Day index outside `0..=6`.
    #[error("day {0} is outside 0..=6")]
    InvalidDay(u8),
    /// Minute value outside a single day.
    #[error("minute {0} is outside 0..={MINUTES_PER_DAY}")]
    InvalidMinute(u32),
}

impl Period {
    /// Validates and constructs a [`Period`].
    ///
    /// `close == None` describes the listing source's "open 24 hours" shape
    /// when `open == 0`, and an unknown closing time otherwise.
    ///
    /// # Errors
    /// Returns [`OpeningHoursError`] when the day or a minute value is out of
    /// range.
    pub const fn new(
        day: u8,
        open: u32,
        close: Option<u32>,
        is_overnight: bool,
    ) -> Result<Self, OpeningHoursError> {
        if day > 6 {
            return Err(OpeningHoursError::InvalidDay(day));
        }
        if open > MINUTES_PER_DAY {
            return Err(OpeningHoursError::InvalidMinute(open));
        }
        if let Some(minute) = close
            && minute > MINUTES_PER_DAY
        {
            return Err(OpeningHoursError::InvalidMinute(minute));
        }
        Ok(Self {
            day,
            open,
            close,
            is_overnight,
        })
    }

    /// Same-day period from `open` to `close`.
    ///
    /// # Errors
    /// See [`Period::new`].
    pub const fn daytime(day: u8, open: u32, close: u32) -> Result<Self, OpeningHoursError> {
        Self::new(day, open, Some(close), false)
    }

    /// Period that opens on `day` and closes at `close` on the next day.
    ///
    /// # Errors
    /// See [`Period::new`].
    pub const fn overnight(day: u8, open: u32, close: u32) -> Result<Self, OpeningHoursError> {
        Self::new(day, open, Some(close), true)
    }

    /// Sunday-based day index.
    #[must_use]
    pub const fn day(&self) -> u8 {
        self.day
    }

    /// Opening minute.
    #[must_use]
    pub const fn open(&self) -> u32 {
        self.open
    }

    /// Closing minute, if known.
    #[must_use]
    pub const fn close(&self) -> Option<u32> {
        self.close
    }

    /// Whether the period spans midnight.
    #[must_use]
    pub const fn is_overnight(&self) -> bool {
        self.is_overnight
    }

    const fn is_round_the_clock(&self) -> bool {
        self.close.is_none() && self.open == 0
    }

    const fn covers(&self, day: u8, previous_day: u8, minute: u32) -> bool {
        let Some(close) = self.close else {
            return self.open == 0;
        };
        if self.day == day {
            if self.open == 0 && close == 0 {
                return minute == 0;
            }
            if self.is_overnight {
                if minute >= self.open {
                    return true;
                }
            } else if self.open <= minute && minute <= close {
                return true;
            }
        }
        self.day == previous_day && self.is_overnight && minute <= close
    }

    /// Opening and closing instants on the week-minute axis.
    fn week_span(&self) -> Option<(u32, u32)> {
        let close = self.close?;
        let base = u32::from(self.day) * MINUTES_PER_DAY;
        let start = base + self.open;
        let end = if self.is_overnight {
            base + MINUTES_PER_DAY + close
        } else {
            base + close
        };
        Some((start, end))
    }
}

/// Where a venue stands relative to its schedule at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpeningStatus {
    /// Never closes.
    Open24Hours,
    /// Open now; closes at the given minute of the local day.
    OpenUntil {
        /// Closing minute since midnight.
        close: u32,
    },
    /// Closed now; opens next on `day` at `open`.
    OpensAt {
        /// Sunday-based day index.
        day: u8,
        /// Opening minute since midnight.
        open: u32,
    },
    /// No schedule information.
    Unknown,
}

/// A weekly opening schedule.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use cafe_core::{OpeningHours, Period};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Saturday 18:00 until Sunday 02:00.
/// let hours = OpeningHours::new(vec![Period::overnight(6, 18 * 60, 2 * 60)?]);
/// let sunday_early = NaiveDate::from_ymd_opt(2026, 1, 11)
///     .and_then(|d| d.and_hms_opt(1, 30, 0))
///     .ok_or("bad date")?;
/// assert!(hours.is_open_at(sunday_early));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpeningHours {
    /// Opening intervals; ignored when `is_24_hours` is set.
    pub periods: Vec<Period>,
    /// The venue never closes.
    pub is_24_hours: bool,
}

fn sunday_based_day(at: NaiveDateTime) -> u8 {
    // `num_days_from_sunday` is always below seven.
    u8::try_from(at.weekday().num_days_from_sunday()).unwrap_or_default()
}

fn minute_of_day(at: NaiveDateTime) -> u32 {
    at.hour() * 60 + at.minute()
}

fn minute_of_week(at: NaiveDateTime) -> u32 {
    u32::from(sunday_based_day(at)) * MINUTES_PER_DAY + minute_of_day(at)
}

impl OpeningHours {
    /// Schedule built from explicit periods.
    #[must_use]
    pub const fn new(periods: Vec<Period>) -> Self {
        Self {
            periods,
            is_24_hours: false,
        }
    }

    /// Schedule for a venue that never closes.
    #[must_use]
    pub const fn always_open() -> Self {
        Self {
            periods: Vec::new(),
            is_24_hours: true,
        }
    }

    fn never_closes(&self) -> bool {
        self.is_24_hours || self.periods.iter().any(Period::is_round_the_clock)
    }

    /// Whether the venue is open at the local wall-clock instant `at`.
    #[must_use]
    pub fn is_open_at(&self, at: NaiveDateTime) -> bool {
        if self.is_24_hours {
            return true;
        }
        let day = sunday_based_day(at);
        let previous_day = (day + 6) % 7;
        let minute = minute_of_day(at);
        self.periods
            .iter()
            .any(|period| period.covers(day, previous_day, minute))
    }

    /// Hours from `at` until the venue next closes.
    ///
    /// Returns `0.0` when closed at `at`, `24.0` for venues that never close,
    /// and [`NEUTRAL_HOURS_UNTIL_CLOSE`] when no periods are known.
    #[must_use]
    pub fn hours_until_close(&self, at: NaiveDateTime) -> f64 {
        if self.never_closes() {
            return ROUND_THE_CLOCK_HOURS;
        }
        if self.periods.is_empty() {
            return NEUTRAL_HOURS_UNTIL_CLOSE;
        }
        self.minutes_until_close(at)
            .map_or(0.0, |minutes| f64::from(minutes) / 60.0)
    }

    fn minutes_until_close(&self, at: NaiveDateTime) -> Option<u32> {
        let now = minute_of_week(at);
        self.periods
            .iter()
            .filter_map(Period::week_span)
            .filter_map(|(start, end)| {
                // Periods that run past Saturday midnight are also checked
                // against the same instant one week later.
                [now, now + MINUTES_PER_WEEK]
                    .into_iter()
                    .find(|&t| start <= t && t < end)
                    .map(|t| end - t)
            })
            .max()
    }

    /// Describe the schedule relative to `at`.
    #[must_use]
    pub fn status(&self, at: NaiveDateTime) -> OpeningStatus {
        if self.never_closes() {
            return OpeningStatus::Open24Hours;
        }
        if let Some(minutes) = self.minutes_until_close(at) {
            let close = (minute_of_week(at) + minutes) % MINUTES_PER_DAY;
            return OpeningStatus::OpenUntil { close };
        }
        let now = minute_of_week(at);
        self.periods
            .iter()
            .filter_map(|period| {
                let (start, _) = period.week_span()?;
                let wait = (start + MINUTES_PER_WEEK - now) % MINUTES_PER_WEEK;
                Some((wait, period))
            })
            .min_by_key(|(wait, _)| *wait)
            .map_or(OpeningStatus::Unknown, |(_, period)| OpeningStatus::OpensAt {
                day: period.day,
                open: period.open,
            })
    }
}

/// Fail-closed availability check.
///
/// A venue without a schedule is treated as closed.
#[must_use]
pub fn is_open(hours: Option<&OpeningHours>, at: NaiveDateTime) -> bool {
    hours.is_some_and(|schedule| schedule.is_open_at(at))
}
