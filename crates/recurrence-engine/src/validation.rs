//! Range validation applied before any expansion runs.
//!
//! The engine itself accepts any window; the limits here are business rules
//! for request-facing queries. Callers that validate elsewhere can pass
//! [`Unrestricted`].

use chrono::{Duration, Months, NaiveDateTime};

use crate::config::RangeLimits;
use crate::error::{RecurrenceError, Result};

/// The kind of query a range belongs to; each kind has its own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// Generic event listing over a custom range.
    Events,
    /// Day, week, or month view.
    View,
    /// "Next N days" listing.
    Upcoming,
    /// Reminder due-check look-ahead.
    ReminderLookahead,
}

/// Decides whether a query range is acceptable.
pub trait RangePolicy {
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidRange`] if the range is rejected.
    fn check(
        &self,
        kind: RangeKind,
        start: NaiveDateTime,
        end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<()>;
}

/// Accepts every well-ordered range.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl RangePolicy for Unrestricted {
    fn check(
        &self,
        _kind: RangeKind,
        start: NaiveDateTime,
        end: NaiveDateTime,
        _now: NaiveDateTime,
    ) -> Result<()> {
        check_order(start, end)
    }
}

impl RangePolicy for RangeLimits {
    fn check(
        &self,
        kind: RangeKind,
        start: NaiveDateTime,
        end: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<()> {
        check_order(start, end)?;
        let length = end - start;
        match kind {
            RangeKind::Events => {
                check_length(length, span_days(self.max_range_days), "date range")?;
                check_horizon(end, now, self.event_horizon_years)
            }
            RangeKind::View => {
                check_length(length, span_days(self.max_range_days), "view range")?;
                check_horizon(end, now, self.view_horizon_years)
            }
            RangeKind::Upcoming => check_length(
                length,
                span_days(self.max_upcoming_days),
                "upcoming range",
            ),
            RangeKind::ReminderLookahead => check_length(
                length,
                Duration::try_minutes(self.max_reminder_lookahead_minutes).unwrap_or(Duration::MAX),
                "reminder look-ahead",
            ),
        }
    }
}

fn span_days(days: i64) -> Duration {
    Duration::try_days(days).unwrap_or(Duration::MAX)
}

fn check_order(start: NaiveDateTime, end: NaiveDateTime) -> Result<()> {
    if end < start {
        return Err(RecurrenceError::InvalidRange(format!(
            "end {end} is before start {start}"
        )));
    }
    Ok(())
}

fn check_length(length: Duration, limit: Duration, what: &str) -> Result<()> {
    if length > limit {
        return Err(RecurrenceError::InvalidRange(format!(
            "{what} of {} exceeds the limit of {}",
            describe(length),
            describe(limit)
        )));
    }
    Ok(())
}

fn check_horizon(end: NaiveDateTime, now: NaiveDateTime, years: u32) -> Result<()> {
    let horizon = now
        .checked_add_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDateTime::MAX);
    if end > horizon {
        return Err(RecurrenceError::InvalidRange(format!(
            "range ends at {end}, more than {years} years in the future"
        )));
    }
    Ok(())
}

fn describe(length: Duration) -> String {
    if length.num_days() > 0 {
        format!("{} days", length.num_days())
    } else {
        format!("{} minutes", length.num_minutes())
    }
}
