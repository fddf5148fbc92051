//! Recurrence definitions attached 1:1 to a calendar event.
//!
//! A [`RecurrencePattern`] is always valid once constructed: every way in
//! (builder, deserialization) runs the same checks, and the generator
//! re-runs them before expanding.

use std::fmt;

use chrono::{Datelike, Month, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{RecurrenceError, Result};
use crate::weekday::DaysOfWeek;

/// How often a pattern repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    /// A single, non-repeating event.
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for RecurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecurrenceType::None => "none",
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

/// When a recurring series stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Last occurrence starts on or before this date (inclusive).
    Until(NaiveDate),
    /// Exactly this many occurrences.
    Count(u32),
    /// No bound of its own; only the expansion safety ceiling stops it.
    Unbounded,
}

/// A validated recurrence rule.
///
/// # Examples
///
/// ```
/// use recurrence_engine::{DaysOfWeek, RecurrencePattern, RecurrenceType};
///
/// let pattern = RecurrencePattern::weekly(2, DaysOfWeek::TUESDAY | DaysOfWeek::THURSDAY)
///     .count(8)
///     .build()
///     .unwrap();
/// assert_eq!(pattern.recurrence_type(), RecurrenceType::Weekly);
/// assert_eq!(pattern.describe(), "Every 2 weeks on Tue, Thu, 8 times");
///
/// // A recurring pattern must say when it ends.
/// assert!(RecurrencePattern::daily(1).build().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PatternRecord", into = "PatternRecord")]
pub struct RecurrencePattern {
    recurrence_type: RecurrenceType,
    interval: u32,
    days_of_week: DaysOfWeek,
    day_of_month: Option<u32>,
    month_of_year: Option<u32>,
    termination: Termination,
}

impl RecurrencePattern {
    /// A non-repeating pattern: the event occurs once.
    pub fn once() -> Self {
        Self {
            recurrence_type: RecurrenceType::None,
            interval: 1,
            days_of_week: DaysOfWeek::NONE,
            day_of_month: None,
            month_of_year: None,
            termination: Termination::Count(1),
        }
    }

    pub fn daily(interval: u32) -> PatternBuilder {
        PatternBuilder::new(RecurrenceType::Daily, interval)
    }

    pub fn weekly(interval: u32, days_of_week: DaysOfWeek) -> PatternBuilder {
        let mut builder = PatternBuilder::new(RecurrenceType::Weekly, interval);
        builder.days_of_week = days_of_week;
        builder
    }

    pub fn monthly(interval: u32) -> PatternBuilder {
        PatternBuilder::new(RecurrenceType::Monthly, interval)
    }

    pub fn yearly(interval: u32) -> PatternBuilder {
        PatternBuilder::new(RecurrenceType::Yearly, interval)
    }

    pub fn recurrence_type(&self) -> RecurrenceType {
        self.recurrence_type
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn days_of_week(&self) -> DaysOfWeek {
        self.days_of_week
    }

    pub fn day_of_month(&self) -> Option<u32> {
        self.day_of_month
    }

    pub fn month_of_year(&self) -> Option<u32> {
        self.month_of_year
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence_type != RecurrenceType::None
    }

    /// Day of month used by monthly patterns, falling back to the anchor's day.
    pub fn effective_day_of_month(&self, anchor: NaiveDateTime) -> u32 {
        self.day_of_month.unwrap_or_else(|| anchor.day())
    }

    /// Month used by yearly patterns, falling back to the anchor's month.
    pub fn effective_month_of_year(&self, anchor: NaiveDateTime) -> u32 {
        self.month_of_year.unwrap_or_else(|| anchor.month())
    }

    /// Check every structural invariant.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidPattern`] if the interval is zero, a
    /// weekly pattern has no weekdays, the day or month is out of range, or a
    /// recurring pattern has a zero occurrence count.
    pub fn validate(&self) -> Result<()> {
        if self.interval < 1 {
            return Err(RecurrenceError::InvalidPattern(
                "interval must be at least 1".to_string(),
            ));
        }
        if self.recurrence_type == RecurrenceType::Weekly && self.days_of_week.is_empty() {
            return Err(RecurrenceError::InvalidPattern(
                "weekly pattern must select at least one day of the week".to_string(),
            ));
        }
        if let Some(day) = self.day_of_month {
            if !(1..=31).contains(&day) {
                return Err(RecurrenceError::InvalidPattern(format!(
                    "day of month must be within 1-31, got {day}"
                )));
            }
        }
        if let Some(month) = self.month_of_year {
            if !(1..=12).contains(&month) {
                return Err(RecurrenceError::InvalidPattern(format!(
                    "month of year must be within 1-12, got {month}"
                )));
            }
        }
        if self.is_recurring() && self.termination == Termination::Count(0) {
            return Err(RecurrenceError::InvalidPattern(
                "max occurrences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the pattern as an RFC 5545 RRULE value.
    ///
    /// Returns `None` for non-repeating patterns. Weekly rules carry
    /// `WKST=SU` so interval blocks line up with Sunday-based weeks.
    ///
    /// RFC 5545 skips months that lack the requested day, whereas this engine
    /// clamps to the month's last day. A monthly rule on days 29-31 therefore
    /// expands differently in RRULE consumers.
    pub fn to_rrule(&self) -> Option<String> {
        let freq = match self.recurrence_type {
            RecurrenceType::None => return None,
            RecurrenceType::Daily => "DAILY",
            RecurrenceType::Weekly => "WEEKLY",
            RecurrenceType::Monthly => "MONTHLY",
            RecurrenceType::Yearly => "YEARLY",
        };

        let mut parts = vec![format!("FREQ={freq}")];
        if self.interval > 1 {
            parts.push(format!("INTERVAL={}", self.interval));
        }
        match self.recurrence_type {
            RecurrenceType::Weekly => {
                parts.push("WKST=SU".to_string());
                let days: Vec<&str> = self.days_of_week.iter().map(rrule_day_code).collect();
                parts.push(format!("BYDAY={}", days.join(",")));
            }
            RecurrenceType::Monthly => {
                if let Some(day) = self.day_of_month {
                    parts.push(format!("BYMONTHDAY={day}"));
                }
            }
            RecurrenceType::Yearly => {
                if let Some(month) = self.month_of_year {
                    parts.push(format!("BYMONTH={month}"));
                }
            }
            RecurrenceType::None | RecurrenceType::Daily => {}
        }
        match self.termination {
            Termination::Count(count) => parts.push(format!("COUNT={count}")),
            Termination::Until(date) => {
                parts.push(format!("UNTIL={}T235959", date.format("%Y%m%d")));
            }
            Termination::Unbounded => {}
        }
        Some(parts.join(";"))
    }

    /// A short human-readable summary, e.g. `"Every 2 weeks on Mon, Wed, until 2026-06-30"`.
    pub fn describe(&self) -> String {
        let cadence = match self.recurrence_type {
            RecurrenceType::None => return "Once".to_string(),
            RecurrenceType::Daily => every(self.interval, "day"),
            RecurrenceType::Weekly => {
                format!("{} on {}", every(self.interval, "week"), self.days_of_week)
            }
            RecurrenceType::Monthly => match self.day_of_month {
                Some(day) => format!("{} on day {day}", every(self.interval, "month")),
                None => every(self.interval, "month"),
            },
            RecurrenceType::Yearly => {
                let month = self
                    .month_of_year
                    .and_then(|m| u8::try_from(m).ok())
                    .and_then(|m| Month::try_from(m).ok());
                match month {
                    Some(month) => format!("{} in {}", every(self.interval, "year"), month.name()),
                    None => every(self.interval, "year"),
                }
            }
        };
        match self.termination {
            Termination::Count(1) => format!("{cadence}, once"),
            Termination::Count(count) => format!("{cadence}, {count} times"),
            Termination::Until(date) => format!("{cadence}, until {date}"),
            Termination::Unbounded => cadence,
        }
    }
}

fn every(interval: u32, unit: &str) -> String {
    if interval == 1 {
        format!("Every {unit}")
    } else {
        format!("Every {interval} {unit}s")
    }
}

fn rrule_day_code(weekday: chrono::Weekday) -> &'static str {
    match weekday {
        chrono::Weekday::Sun => "SU",
        chrono::Weekday::Mon => "MO",
        chrono::Weekday::Tue => "TU",
        chrono::Weekday::Wed => "WE",
        chrono::Weekday::Thu => "TH",
        chrono::Weekday::Fri => "FR",
        chrono::Weekday::Sat => "SA",
    }
}

// ── Builder ─────────────────────────────────────────────────────────────────

/// Builder for recurring patterns. Finish with [`PatternBuilder::build`].
#[derive(Debug, Clone)]
pub struct PatternBuilder {
    recurrence_type: RecurrenceType,
    interval: u32,
    days_of_week: DaysOfWeek,
    day_of_month: Option<u32>,
    month_of_year: Option<u32>,
    end_date: Option<NaiveDate>,
    max_occurrences: Option<u32>,
    unbounded: bool,
}

impl PatternBuilder {
    fn new(recurrence_type: RecurrenceType, interval: u32) -> Self {
        Self {
            recurrence_type,
            interval,
            days_of_week: DaysOfWeek::NONE,
            day_of_month: None,
            month_of_year: None,
            end_date: None,
            max_occurrences: None,
            unbounded: false,
        }
    }

    /// Day of month for monthly patterns (1-31, clamped per month).
    pub fn on_day(mut self, day_of_month: u32) -> Self {
        self.day_of_month = Some(day_of_month);
        self
    }

    /// Month for yearly patterns (1-12).
    pub fn in_month(mut self, month_of_year: u32) -> Self {
        self.month_of_year = Some(month_of_year);
        self
    }

    /// Stop after the last occurrence starting on or before `end_date`.
    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Stop after `max_occurrences` occurrences.
    pub fn count(mut self, max_occurrences: u32) -> Self {
        self.max_occurrences = Some(max_occurrences);
        self
    }

    /// Accept a series with no end date or count. Such series are bounded
    /// only by [`ExpansionLimits`](crate::ExpansionLimits), and results that
    /// reach the ceiling are flagged as truncated.
    pub fn unbounded(mut self) -> Self {
        self.unbounded = true;
        self
    }

    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidPattern`] if the pattern violates an
    /// invariant or does not specify exactly one of end date and max
    /// occurrences (unless [`unbounded`](Self::unbounded) was requested).
    pub fn build(self) -> Result<RecurrencePattern> {
        let termination =
            resolve_termination(self.end_date, self.max_occurrences, self.unbounded)?;
        let pattern = RecurrencePattern {
            recurrence_type: self.recurrence_type,
            interval: self.interval,
            days_of_week: self.days_of_week,
            day_of_month: self.day_of_month,
            month_of_year: self.month_of_year,
            termination,
        };
        pattern.validate()?;
        Ok(pattern)
    }
}

fn resolve_termination(
    end_date: Option<NaiveDate>,
    max_occurrences: Option<u32>,
    unbounded: bool,
) -> Result<Termination> {
    match (end_date, max_occurrences) {
        (Some(date), None) => Ok(Termination::Until(date)),
        (None, Some(count)) => Ok(Termination::Count(count)),
        (None, None) if unbounded => Ok(Termination::Unbounded),
        _ => Err(RecurrenceError::InvalidPattern(
            "either end date or max occurrences must be specified".to_string(),
        )),
    }
}

// ── Stored shape ────────────────────────────────────────────────────────────

/// Flat row shape used for (de)serialization, mirroring persisted patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PatternRecord {
    recurrence_type: RecurrenceType,
    #[serde(default = "default_interval")]
    interval: u32,
    #[serde(default)]
    days_of_week: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    day_of_month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    month_of_year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_occurrences: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    open_ended: bool,
}

fn default_interval() -> u32 {
    1
}

impl TryFrom<PatternRecord> for RecurrencePattern {
    type Error = RecurrenceError;

    fn try_from(record: PatternRecord) -> Result<Self> {
        if record.recurrence_type == RecurrenceType::None {
            return Ok(RecurrencePattern::once());
        }
        let mut builder = PatternBuilder::new(record.recurrence_type, record.interval);
        builder.days_of_week = DaysOfWeek::try_from(record.days_of_week)?;
        builder.day_of_month = record.day_of_month;
        builder.month_of_year = record.month_of_year;
        builder.end_date = record.end_date;
        builder.max_occurrences = record.max_occurrences;
        builder.unbounded = record.open_ended;
        builder.build()
    }
}

impl From<RecurrencePattern> for PatternRecord {
    fn from(pattern: RecurrencePattern) -> Self {
        let (end_date, max_occurrences, open_ended) = match pattern.termination {
            _ if !pattern.is_recurring() => (None, None, false),
            Termination::Until(date) => (Some(date), None, false),
            Termination::Count(count) => (None, Some(count), false),
            Termination::Unbounded => (None, None, true),
        };
        PatternRecord {
            recurrence_type: pattern.recurrence_type,
            interval: pattern.interval,
            days_of_week: pattern.days_of_week.bits(),
            day_of_month: pattern.day_of_month,
            month_of_year: pattern.month_of_year,
            end_date,
            max_occurrences,
            open_ended,
        }
    }
}
