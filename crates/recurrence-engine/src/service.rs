//! Calendar views over a set of candidate events.
//!
//! [`CalendarQueryService`] is request-scoped: it is built with the request's
//! "now", validates ranges through a [`RangePolicy`], expands each candidate
//! through [`WindowedQuery`], and buckets the flattened result into day, week,
//! and month views. Candidate selection (tenant, user, project filters) happens
//! upstream; every candidate passed in is expanded.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ExpansionLimits, RangeLimits};
use crate::error::{RecurrenceError, Result};
use crate::event::{intervals_overlap, CalendarEvent, Occurrence};
use crate::generator::last_day_of_month;
use crate::overrides::OverrideSet;
use crate::pattern::RecurrencePattern;
use crate::validation::{RangeKind, RangePolicy};
use crate::weekday::WeekStartDay;
use crate::window::WindowedQuery;

// ── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// An event as loaded by the persistence layer, with its optional pattern,
/// overrides, and presentation fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event: CalendarEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<RecurrencePattern>,
    #[serde(default, skip_serializing_if = "OverrideSet::is_empty")]
    pub overrides: OverrideSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl ScheduledEvent {
    pub fn new(event: CalendarEvent) -> Self {
        Self {
            event,
            pattern: None,
            overrides: OverrideSet::new(),
            color: None,
            priority: None,
        }
    }

    pub fn with_pattern(mut self, pattern: RecurrencePattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_overrides(mut self, overrides: OverrideSet) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

// ── Outputs ─────────────────────────────────────────────────────────────────

/// One occurrence decorated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarItem {
    pub event_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub is_all_day: bool,
    pub is_recurring: bool,
    pub sequence_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled_from: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl CalendarItem {
    fn from_occurrence(source: &ScheduledEvent, occurrence: Occurrence) -> Self {
        let event = &source.event;
        Self {
            event_id: event.id,
            tenant_id: event.tenant_id,
            title: occurrence
                .title_override
                .unwrap_or_else(|| event.title.clone()),
            start: occurrence.start,
            end: occurrence.end,
            is_all_day: event.is_all_day,
            is_recurring: source
                .pattern
                .as_ref()
                .is_some_and(RecurrencePattern::is_recurring),
            sequence_index: occurrence.sequence_index,
            rescheduled_from: occurrence.rescheduled_from,
            location: event.location.clone(),
            color: source.color.clone(),
            priority: source.priority,
        }
    }
}

/// Flat, ordered list of items for a range query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemList {
    pub items: Vec<CalendarItem>,
    pub truncated: bool,
}

/// Items overlapping one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayView {
    pub date: NaiveDate,
    pub all_day: Vec<CalendarItem>,
    pub timed: Vec<CalendarItem>,
    pub truncated: bool,
}

impl DayView {
    pub fn len(&self) -> usize {
        self.all_day.len() + self.timed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_day.is_empty() && self.timed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub days: Vec<DayView>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days: Vec<DayView>,
    pub truncated: bool,
}

// ── Service ─────────────────────────────────────────────────────────────────

/// Request-scoped calendar query orchestrator.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, NaiveDate};
/// use recurrence_engine::{CalendarEvent, CalendarQueryService, RecurrencePattern, ScheduledEvent};
/// use uuid::Uuid;
///
/// let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let event = CalendarEvent::new(Uuid::nil(), Uuid::nil(), "Standup", start, start + Duration::minutes(15)).unwrap();
/// let pattern = RecurrencePattern::daily(1).count(30).build().unwrap();
/// let candidates = vec![ScheduledEvent::new(event).with_pattern(pattern)];
///
/// let service = CalendarQueryService::new(start);
/// let week = service.week_view(&candidates, start.date()).unwrap();
/// assert_eq!(week.days.len(), 7);
/// assert!(week.days.iter().all(|day| day.timed.len() == 1));
/// ```
#[derive(Debug, Clone)]
pub struct CalendarQueryService<P = RangeLimits> {
    now: NaiveDateTime,
    policy: P,
    limits: ExpansionLimits,
    week_start: WeekStartDay,
}

impl CalendarQueryService<RangeLimits> {
    /// A service using the default business range limits.
    pub fn new(now: NaiveDateTime) -> Self {
        Self::with_policy(now, RangeLimits::default())
    }
}

impl<P: RangePolicy> CalendarQueryService<P> {
    pub fn with_policy(now: NaiveDateTime, policy: P) -> Self {
        Self {
            now,
            policy,
            limits: ExpansionLimits::default(),
            week_start: WeekStartDay::default(),
        }
    }

    pub fn expansion_limits(mut self, limits: ExpansionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn week_start(mut self, week_start: WeekStartDay) -> Self {
        self.week_start = week_start;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Every item overlapping `[start, end)`, ordered by start.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidRange`] if the policy rejects the
    /// range, or the first pattern/event error among the candidates.
    pub fn range(
        &self,
        candidates: &[ScheduledEvent],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<ItemList> {
        self.policy.check(RangeKind::Events, start, end, self.now)?;
        self.collect(candidates, start, end)
    }

    /// Items overlapping `date`, split into all-day and timed.
    ///
    /// # Errors
    ///
    /// As [`CalendarQueryService::range`].
    pub fn day_view(&self, candidates: &[ScheduledEvent], date: NaiveDate) -> Result<DayView> {
        let mut days = self.bucketed(candidates, date, 1)?;
        days.pop().ok_or_else(|| {
            RecurrenceError::InvalidRange(format!("no day bucket produced for {date}"))
        })
    }

    /// Seven day buckets for the week containing `date`.
    ///
    /// # Errors
    ///
    /// As [`CalendarQueryService::range`].
    pub fn week_view(&self, candidates: &[ScheduledEvent], date: NaiveDate) -> Result<WeekView> {
        let week_start = self.week_start.week_containing(date).ok_or_else(|| {
            RecurrenceError::InvalidRange(format!("week containing {date} is out of range"))
        })?;
        let days = self.bucketed(candidates, week_start, 7)?;
        let truncated = days.iter().any(|day| day.truncated);
        Ok(WeekView {
            week_start,
            days,
            truncated,
        })
    }

    /// One day bucket per day of `month` in `year`.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidRange`] for an invalid month, and
    /// otherwise as [`CalendarQueryService::range`].
    pub fn month_view(
        &self,
        candidates: &[ScheduledEvent],
        year: i32,
        month: u32,
    ) -> Result<MonthView> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            RecurrenceError::InvalidRange(format!("invalid month {year}-{month:02}"))
        })?;
        let length = last_day_of_month(year, month).ok_or_else(|| {
            RecurrenceError::InvalidRange(format!("invalid month {year}-{month:02}"))
        })?;
        let days = self.bucketed(candidates, first, length)?;
        let truncated = days.iter().any(|day| day.truncated);
        Ok(MonthView {
            year,
            month,
            days,
            truncated,
        })
    }

    /// Items overlapping the next `days` days, starting now.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidRange`] if `days` is negative or
    /// above the upcoming limit.
    pub fn upcoming(&self, candidates: &[ScheduledEvent], days: i64) -> Result<ItemList> {
        let end = Duration::try_days(days)
            .and_then(|span| self.now.checked_add_signed(span))
            .ok_or_else(|| {
                RecurrenceError::InvalidRange(format!("upcoming range of {days} days is out of range"))
            })?;
        self.policy
            .check(RangeKind::Upcoming, self.now, end, self.now)?;
        self.collect(candidates, self.now, end)
    }

    /// Occurrences starting within `lookahead` of now, for reminder checks.
    ///
    /// Unlike the other queries this is a start-point test: an occurrence
    /// already in progress is not "starting".
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidRange`] if the look-ahead is negative
    /// or exceeds the reminder limit.
    pub fn starting_within(
        &self,
        candidates: &[ScheduledEvent],
        lookahead: Duration,
    ) -> Result<ItemList> {
        let end = self.now.checked_add_signed(lookahead).ok_or_else(|| {
            RecurrenceError::InvalidRange("reminder look-ahead overflows".to_string())
        })?;
        self.policy
            .check(RangeKind::ReminderLookahead, self.now, end, self.now)?;
        let mut list = self.collect(candidates, self.now, end)?;
        list.items
            .retain(|item| item.start >= self.now && item.start < end);
        Ok(list)
    }

    fn bucketed(
        &self,
        candidates: &[ScheduledEvent],
        first_day: NaiveDate,
        length: u32,
    ) -> Result<Vec<DayView>> {
        let start = first_day.and_time(NaiveTime::MIN);
        let end = start
            .checked_add_signed(Duration::days(i64::from(length)))
            .ok_or_else(|| {
                RecurrenceError::InvalidRange(format!("view starting {first_day} is out of range"))
            })?;
        self.policy.check(RangeKind::View, start, end, self.now)?;
        let list = self.collect(candidates, start, end)?;

        let mut days: Vec<DayView> = first_day
            .iter_days()
            .take(length as usize)
            .map(|date| DayView {
                date,
                all_day: Vec::new(),
                timed: Vec::new(),
                truncated: list.truncated,
            })
            .collect();

        for item in &list.items {
            for day in days.iter_mut() {
                let day_start = day.date.and_time(NaiveTime::MIN);
                let day_end = day_start
                    .checked_add_signed(Duration::days(1))
                    .unwrap_or(end);
                if !intervals_overlap(item.start, item.end, day_start, day_end) {
                    continue;
                }
                if item.is_all_day {
                    day.all_day.push(item.clone());
                } else {
                    day.timed.push(item.clone());
                }
            }
        }
        Ok(days)
    }

    fn collect(
        &self,
        candidates: &[ScheduledEvent],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<ItemList> {
        tracing::debug!(
            candidates = candidates.len(),
            %start,
            %end,
            "Collecting calendar items"
        );

        let once = RecurrencePattern::once();
        let mut items = Vec::new();
        let mut truncated = false;

        for candidate in candidates {
            let pattern = candidate.pattern.as_ref().unwrap_or(&once);
            let window = WindowedQuery::new(&candidate.event, pattern)
                .limits(self.limits)
                .overrides(&candidate.overrides)
                .run(start, end)?;
            tracing::trace!(
                event_id = %candidate.event.id,
                occurrences = window.len(),
                truncated = window.truncated,
                "Expanded candidate"
            );
            truncated |= window.truncated;
            items.extend(
                window
                    .occurrences
                    .into_iter()
                    .map(|occurrence| CalendarItem::from_occurrence(candidate, occurrence)),
            );
        }

        items.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| a.end.cmp(&b.end))
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.event_id.cmp(&b.event_id))
                .then_with(|| a.sequence_index.cmp(&b.sequence_index))
        });

        Ok(ItemList { items, truncated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Unrestricted;
    use crate::weekday::DaysOfWeek;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn event(n: u128, title: &str, start: NaiveDateTime, duration: Duration) -> CalendarEvent {
        CalendarEvent::new(id(n), id(100), title, start, start + duration).unwrap()
    }

    fn candidates() -> Vec<ScheduledEvent> {
        vec![
            ScheduledEvent::new(event(1, "Standup", dt(2026, 3, 2, 9), Duration::minutes(15)))
                .with_pattern(
                    RecurrencePattern::weekly(1, DaysOfWeek::WEEKDAYS)
                        .unbounded()
                        .build()
                        .unwrap(),
                )
                .with_color("#3b82f6")
                .with_priority(Priority::Normal),
            ScheduledEvent::new(
                event(2, "Offsite", dt(2026, 3, 4, 0), Duration::days(2)).all_day(true),
            )
            .with_priority(Priority::High),
            ScheduledEvent::new(event(3, "Retro", dt(2026, 3, 6, 15), Duration::hours(1))),
        ]
    }

    #[test]
    fn test_range_is_sorted_and_decorated() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8));
        let list = service
            .range(&candidates(), dt(2026, 3, 2, 0), dt(2026, 3, 7, 0))
            .unwrap();
        let titles: Vec<&str> = list.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Standup", "Standup", "Offsite", "Standup", "Standup", "Standup", "Retro"]
        );
        assert!(list.items.windows(2).all(|w| w[0].start <= w[1].start));
        assert_eq!(list.items[0].color.as_deref(), Some("#3b82f6"));
        assert!(list.items[0].is_recurring);
        assert!(!list.items[2].is_recurring);
        assert!(!list.truncated);
    }

    #[test]
    fn test_day_view_splits_all_day() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8));
        let day = service.day_view(&candidates(), date(2026, 3, 5)).unwrap();
        assert_eq!(day.date, date(2026, 3, 5));
        assert_eq!(day.all_day.len(), 1);
        assert_eq!(day.all_day[0].title, "Offsite");
        assert_eq!(day.timed.len(), 1);
        assert_eq!(day.timed[0].title, "Standup");
        assert_eq!(day.len(), 2);
    }

    #[test]
    fn test_multi_day_item_lands_in_each_day() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8));
        let week = service.week_view(&candidates(), date(2026, 3, 4)).unwrap();
        assert_eq!(week.week_start, date(2026, 3, 2));
        let offsite_days: Vec<NaiveDate> = week
            .days
            .iter()
            .filter(|day| day.all_day.iter().any(|item| item.title == "Offsite"))
            .map(|day| day.date)
            .collect();
        assert_eq!(offsite_days, vec![date(2026, 3, 4), date(2026, 3, 5)]);
    }

    #[test]
    fn test_week_view_sunday_start() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8)).week_start(WeekStartDay::Sunday);
        let week = service.week_view(&candidates(), date(2026, 3, 4)).unwrap();
        assert_eq!(week.week_start, date(2026, 3, 1));
        assert_eq!(week.days.len(), 7);
        assert!(week.days[0].is_empty());
        assert!(week.days[6].is_empty());
    }

    #[test]
    fn test_month_view_has_one_bucket_per_day() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8));
        let month = service.month_view(&candidates(), 2026, 2).unwrap();
        assert_eq!(month.days.len(), 28);
        assert!(month.days.iter().all(DayView::is_empty));

        let march = service.month_view(&candidates(), 2026, 3).unwrap();
        assert_eq!(march.days.len(), 31);
        let standups: usize = march.days.iter().map(|day| day.timed.len()).sum();
        // 22 weekdays from Mon 2 Mar to Tue 31 Mar, plus the retro
        assert_eq!(standups, 23);
    }

    #[test]
    fn test_month_view_rejects_bad_month() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8));
        let err = service.month_view(&candidates(), 2026, 13).unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidRange(_)));
    }

    #[test]
    fn test_range_limit_enforced() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8));
        let err = service
            .range(&candidates(), dt(2026, 1, 1, 0), dt(2027, 6, 1, 0))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"), "got: {err}");

        let relaxed = CalendarQueryService::with_policy(dt(2026, 3, 1, 8), Unrestricted);
        assert!(relaxed
            .range(&candidates(), dt(2026, 1, 1, 0), dt(2027, 6, 1, 0))
            .is_ok());
    }

    #[test]
    fn test_upcoming_includes_in_progress() {
        let service = CalendarQueryService::new(dt(2026, 3, 4, 12));
        let list = service.upcoming(&candidates(), 2).unwrap();
        let titles: Vec<&str> = list.items.iter().map(|i| i.title.as_str()).collect();
        // Offsite is still in progress at noon on the 4th; that day's standup is over
        assert_eq!(titles, vec!["Offsite", "Standup", "Standup"]);
        assert!(service.upcoming(&candidates(), 91).is_err());
    }

    #[test]
    fn test_oversized_spans_are_range_errors() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8));
        for days in [i64::MAX / 1000, i64::MAX, i64::MIN] {
            let err = service.upcoming(&candidates(), days).unwrap_err();
            assert!(matches!(err, RecurrenceError::InvalidRange(_)), "days {days}: {err}");
        }
        let err = service
            .starting_within(&candidates(), Duration::MAX)
            .unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidRange(_)));
    }

    #[test]
    fn test_views_at_calendar_edges_are_range_errors() {
        let service = CalendarQueryService::with_policy(dt(2026, 3, 1, 8), Unrestricted);
        assert!(matches!(
            service.day_view(&candidates(), NaiveDate::MAX).unwrap_err(),
            RecurrenceError::InvalidRange(_)
        ));
        assert!(service.week_view(&candidates(), NaiveDate::MAX).is_err());
    }

    #[test]
    fn test_starting_within_is_start_point_test() {
        let service = CalendarQueryService::new(dt(2026, 3, 4, 8) + Duration::minutes(30));
        let list = service
            .starting_within(&candidates(), Duration::minutes(60))
            .unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].title, "Standup");
        assert!(service
            .starting_within(&candidates(), Duration::minutes(90))
            .is_err());
    }

    #[test]
    fn test_stored_candidate_expands() {
        let json = r#"{
            "event": {
                "id": "00000000-0000-0000-0000-000000000009",
                "tenant_id": "00000000-0000-0000-0000-000000000064",
                "title": "Payroll",
                "start": "2026-01-31T10:00:00",
                "end": "2026-01-31T11:00:00"
            },
            "pattern": {"recurrence_type": "monthly", "max_occurrences": 12},
            "priority": "urgent"
        }"#;
        let candidate: ScheduledEvent = serde_json::from_str(json).unwrap();
        let service = CalendarQueryService::new(dt(2026, 1, 1, 8));
        let list = service
            .range(&[candidate], dt(2026, 2, 1, 0), dt(2026, 5, 1, 0))
            .unwrap();
        let starts: Vec<NaiveDateTime> = list.items.iter().map(|i| i.start).collect();
        assert_eq!(
            starts,
            vec![dt(2026, 2, 28, 10), dt(2026, 3, 31, 10), dt(2026, 4, 30, 10)]
        );
        assert_eq!(list.items[0].priority, Some(Priority::Urgent));
        assert!(list.items[0].is_recurring);
    }

    #[test]
    fn test_truncation_propagates_to_views() {
        let service = CalendarQueryService::new(dt(2026, 3, 1, 8)).expansion_limits(ExpansionLimits {
            max_occurrences: 2,
            max_span_years: 100,
        });
        let week = service.week_view(&candidates(), date(2026, 3, 4)).unwrap();
        assert!(week.truncated);
        assert!(week.days.iter().all(|day| day.truncated));
    }
}
