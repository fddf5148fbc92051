//! Windowed occurrence queries: which occurrences overlap `[start, end)`?
//!
//! The query never walks a series from its anchor. It asks the generator for
//! a closed-form lower-bound index at `start - duration` (the earliest start
//! that could still overlap the window) and steps forward from there until an
//! occurrence starts after `end`. The cost is proportional to the number of
//! occurrences in the window, plus at most one period of lead-in.

use std::sync::atomic::AtomicBool;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::ExpansionLimits;
use crate::error::{RecurrenceError, Result};
use crate::event::{CalendarEvent, Occurrence};
use crate::generator::{OccurrenceGenerator, Occurrences, StopReason, TruncationReason};
use crate::overrides::OverrideSet;
use crate::pattern::RecurrencePattern;

/// Result envelope of a windowed query.
///
/// An empty `occurrences` list is a valid answer, not an error. When
/// `truncated` is set the list is a usable prefix of the full answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceWindow {
    pub occurrences: Vec<Occurrence>,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<TruncationReason>,
}

impl OccurrenceWindow {
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }
}

/// Expand the occurrences of `event` that overlap `[window_start, window_end)`
/// with default limits and no overrides.
///
/// # Errors
///
/// Returns [`RecurrenceError::InvalidPattern`] for a malformed pattern,
/// [`RecurrenceError::InvalidEvent`] for an event ending before it starts, or
/// [`RecurrenceError::InvalidRange`] if `window_end < window_start`.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, NaiveDate};
/// use recurrence_engine::{occurrences, CalendarEvent, RecurrencePattern};
/// use uuid::Uuid;
///
/// let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let event = CalendarEvent::new(Uuid::nil(), Uuid::nil(), "Standup", start, start + Duration::minutes(15)).unwrap();
/// let pattern = RecurrencePattern::daily(1).count(5).build().unwrap();
///
/// // A window far larger than the series still yields exactly five.
/// let window_end = start + Duration::days(365);
/// let result = occurrences(&event, &pattern, start, window_end).unwrap();
/// assert_eq!(result.len(), 5);
/// assert!(!result.truncated);
/// ```
pub fn occurrences(
    event: &CalendarEvent,
    pattern: &RecurrencePattern,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> Result<OccurrenceWindow> {
    WindowedQuery::new(event, pattern).run(window_start, window_end)
}

/// Configurable windowed query over one event.
#[derive(Debug, Clone)]
pub struct WindowedQuery<'a> {
    event: &'a CalendarEvent,
    pattern: &'a RecurrencePattern,
    limits: ExpansionLimits,
    overrides: Option<&'a OverrideSet>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> WindowedQuery<'a> {
    pub fn new(event: &'a CalendarEvent, pattern: &'a RecurrencePattern) -> Self {
        Self {
            event,
            pattern,
            limits: ExpansionLimits::default(),
            overrides: None,
            cancel: None,
        }
    }

    pub fn limits(mut self, limits: ExpansionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Apply per-occurrence cancellations and reschedules to the result.
    pub fn overrides(mut self, overrides: &'a OverrideSet) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Stop early (flagged as truncated) once `flag` is set.
    pub fn cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run the query. Identical inputs always produce identical output.
    ///
    /// # Errors
    ///
    /// See [`occurrences`].
    pub fn run(&self, window_start: NaiveDateTime, window_end: NaiveDateTime) -> Result<OccurrenceWindow> {
        if window_end < window_start {
            return Err(RecurrenceError::InvalidRange(format!(
                "window end {window_end} is before window start {window_start}"
            )));
        }

        let generator = OccurrenceGenerator::with_limits(self.event, self.pattern, self.limits)?;
        let earliest_start = window_start
            .checked_sub_signed(generator.duration())
            .unwrap_or(NaiveDateTime::MIN);
        let first_index = generator.lower_bound_index(earliest_start);

        tracing::debug!(
            event_id = %self.event.id,
            %window_start,
            %window_end,
            first_index,
            "Expanding occurrence window"
        );

        let mut iter = generator.iter_from(first_index);
        if let Some(flag) = self.cancel {
            iter = iter.with_cancel_flag(flag);
        }

        let mut found = Vec::new();
        let mut truncation = None;
        loop {
            match iter.next() {
                Some(occurrence) if occurrence.start > window_end => break,
                Some(occurrence) => {
                    if occurrence.overlaps(window_start, window_end) {
                        found.push(occurrence);
                    }
                }
                None => {
                    if let Some(StopReason::Truncated(reason)) = iter.stop_reason() {
                        truncation = truncation_within_window(&generator, &iter, reason, window_end);
                    }
                    break;
                }
            }
        }

        let mut occurrences = match self.overrides {
            Some(overrides) => overrides.apply(&generator, found, window_start, window_end),
            None => found,
        };
        occurrences.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.sequence_index.cmp(&b.sequence_index))
        });

        if let Some(reason) = truncation {
            tracing::warn!(
                event_id = %self.event.id,
                ?reason,
                returned = occurrences.len(),
                "Occurrence window truncated by safety ceiling"
            );
        }

        Ok(OccurrenceWindow {
            occurrences,
            truncated: truncation.is_some(),
            truncation,
        })
    }
}

/// A ceiling only truncates the window if the series would have produced
/// another start inside it.
fn truncation_within_window(
    generator: &OccurrenceGenerator,
    iter: &Occurrences<'_>,
    reason: TruncationReason,
    window_end: NaiveDateTime,
) -> Option<TruncationReason> {
    if reason == TruncationReason::Cancelled {
        return Some(reason);
    }
    let pending = iter
        .next_index()
        .and_then(|index| generator.nominal_start(index));
    match pending {
        Some(start) if start > window_end => None,
        _ => Some(reason),
    }
}
