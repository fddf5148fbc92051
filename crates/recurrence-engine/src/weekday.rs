//! Weekday flag sets and week-start conventions.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::RecurrenceError;

// ── DaysOfWeek ──────────────────────────────────────────────────────────────

/// A set of weekdays stored as the 7-bit mask used by stored patterns.
///
/// Bit 0 is Sunday, bit 6 is Saturday. Iteration is always Sunday first.
///
/// # Examples
///
/// ```
/// use chrono::Weekday;
/// use recurrence_engine::DaysOfWeek;
///
/// let days = DaysOfWeek::MONDAY | DaysOfWeek::WEDNESDAY;
/// assert_eq!(days.bits(), 2 | 8);
/// assert!(days.contains(Weekday::Wed));
/// assert!(!days.contains(Weekday::Sun));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DaysOfWeek(u8);

impl DaysOfWeek {
    pub const NONE: DaysOfWeek = DaysOfWeek(0);
    pub const SUNDAY: DaysOfWeek = DaysOfWeek(1);
    pub const MONDAY: DaysOfWeek = DaysOfWeek(1 << 1);
    pub const TUESDAY: DaysOfWeek = DaysOfWeek(1 << 2);
    pub const WEDNESDAY: DaysOfWeek = DaysOfWeek(1 << 3);
    pub const THURSDAY: DaysOfWeek = DaysOfWeek(1 << 4);
    pub const FRIDAY: DaysOfWeek = DaysOfWeek(1 << 5);
    pub const SATURDAY: DaysOfWeek = DaysOfWeek(1 << 6);
    pub const WEEKDAYS: DaysOfWeek = DaysOfWeek(0b0011_1110);
    pub const WEEKEND: DaysOfWeek = DaysOfWeek(0b0100_0001);
    pub const ALL: DaysOfWeek = DaysOfWeek(0b0111_1111);

    /// Build a set from a raw mask. Returns `None` if any bit above bit 6 is set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL.0 != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, weekday: Weekday) -> bool {
        self.0 & Self::from(weekday).0 != 0
    }

    pub fn insert(&mut self, weekday: Weekday) {
        self.0 |= Self::from(weekday).0;
    }

    /// Flagged weekdays in ascending order, Sunday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        SUNDAY_FIRST
            .into_iter()
            .filter(move |weekday| self.contains(*weekday))
    }

    /// Offsets in days from Sunday of each flagged weekday, ascending.
    pub(crate) fn sunday_offsets(self) -> Vec<i64> {
        self.iter()
            .map(|weekday| i64::from(weekday.num_days_from_sunday()))
            .collect()
    }
}

const SUNDAY_FIRST: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

impl From<Weekday> for DaysOfWeek {
    fn from(weekday: Weekday) -> Self {
        DaysOfWeek(1 << weekday.num_days_from_sunday())
    }
}

impl FromIterator<Weekday> for DaysOfWeek {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut days = DaysOfWeek::NONE;
        for weekday in iter {
            days.insert(weekday);
        }
        days
    }
}

impl TryFrom<u8> for DaysOfWeek {
    type Error = RecurrenceError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        DaysOfWeek::from_bits(bits).ok_or_else(|| {
            RecurrenceError::InvalidPattern(format!(
                "days of week mask must be within 0-127, got {bits}"
            ))
        })
    }
}

impl From<DaysOfWeek> for u8 {
    fn from(days: DaysOfWeek) -> Self {
        days.0
    }
}

impl BitOr for DaysOfWeek {
    type Output = DaysOfWeek;

    fn bitor(self, rhs: Self) -> Self::Output {
        DaysOfWeek(self.0 | rhs.0)
    }
}

impl BitOrAssign for DaysOfWeek {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DaysOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|weekday| weekday.to_string()).collect();
        f.write_str(&names.join(", "))
    }
}

// ── Configurable week start ─────────────────────────────────────────────────

/// Which day begins a week in week views.
///
/// Does **not** affect how weekly patterns tile their interval blocks; those
/// always use Sunday-based weeks to match the weekday mask layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartDay {
    /// ISO 8601 standard (Monday = day 0 of the week).
    #[default]
    Monday,
    /// US/Canada convention (Sunday = day 0 of the week).
    Sunday,
}

impl WeekStartDay {
    /// How many days `weekday` is from this week-start day.
    pub fn days_from_start(self, weekday: Weekday) -> i64 {
        match self {
            WeekStartDay::Monday => i64::from(weekday.num_days_from_monday()),
            WeekStartDay::Sunday => i64::from(weekday.num_days_from_sunday()),
        }
    }

    /// The first day of the week containing `date`.
    ///
    /// Returns `None` when that day precedes the earliest representable date.
    pub fn week_containing(self, date: NaiveDate) -> Option<NaiveDate> {
        let offset = self.days_from_start(date.weekday()).unsigned_abs();
        date.checked_sub_days(Days::new(offset))
    }
}
