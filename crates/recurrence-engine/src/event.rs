//! Base calendar events and the occurrences expanded from them.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RecurrenceError, Result};

/// A calendar event as stored by the persistence layer.
///
/// The `start` instant is the anchor of any recurrence attached to the event,
/// and `end - start` is the duration every occurrence inherits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CalendarEventRecord")]
pub struct CalendarEvent {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl CalendarEvent {
    /// Create an event, rejecting an end before its start.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidEvent`] if `end < start`.
    pub fn new(
        id: Uuid,
        tenant_id: Uuid,
        title: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self> {
        let event = Self {
            id,
            tenant_id,
            title: title.into(),
            start,
            end,
            is_all_day: false,
            description: None,
            location: None,
        };
        event.validate()?;
        Ok(event)
    }

    pub fn all_day(mut self, is_all_day: bool) -> Self {
        self.is_all_day = is_all_day;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.end < self.start {
            return Err(RecurrenceError::InvalidEvent(format!(
                "event {} ends ({}) before it starts ({})",
                self.id, self.end, self.start
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct CalendarEventRecord {
    id: Uuid,
    tenant_id: Uuid,
    title: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    #[serde(default)]
    is_all_day: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

impl TryFrom<CalendarEventRecord> for CalendarEvent {
    type Error = RecurrenceError;

    fn try_from(record: CalendarEventRecord) -> Result<Self> {
        let event = CalendarEvent {
            id: record.id,
            tenant_id: record.tenant_id,
            title: record.title,
            start: record.start,
            end: record.end,
            is_all_day: record.is_all_day,
            description: record.description,
            location: record.location,
        };
        event.validate()?;
        Ok(event)
    }
}

/// One concrete instance of an event. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub event_id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Position in the series, counted from 0 at the first occurrence.
    pub sequence_index: u32,
    /// Set when an override moved this occurrence away from its generated slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rescheduled_from: Option<NaiveDateTime>,
    /// Replacement title from an override, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_override: Option<String>,
}

impl Occurrence {
    pub(crate) fn new(
        event_id: Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        sequence_index: u32,
    ) -> Self {
        Self {
            event_id,
            start,
            end,
            sequence_index,
            rescheduled_from: None,
            title_override: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// The start the generator produced for this slot, before any override.
    pub fn original_start(&self) -> NaiveDateTime {
        self.rescheduled_from.unwrap_or(self.start)
    }

    /// Whether this occurrence's `[start, end)` interval overlaps
    /// `[window_start, window_end)`.
    ///
    /// Zero-width intervals on either side are treated as instants: an
    /// instant overlaps an interval it falls inside (start inclusive, end
    /// exclusive), and two instants overlap only when equal.
    pub fn overlaps(&self, window_start: NaiveDateTime, window_end: NaiveDateTime) -> bool {
        intervals_overlap(self.start, self.end, window_start, window_end)
    }
}

pub(crate) fn intervals_overlap(
    start: NaiveDateTime,
    end: NaiveDateTime,
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
) -> bool {
    match (start == end, window_start == window_end) {
        (true, true) => start == window_start,
        (true, false) => window_start <= start && start < window_end,
        (false, true) => start <= window_start && window_start < end,
        (false, false) => start < window_end && end > window_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_event_rejects_end_before_start() {
        let err = CalendarEvent::new(
            Uuid::nil(),
            Uuid::nil(),
            "Backwards",
            dt(2026, 3, 2, 10),
            dt(2026, 3, 2, 9),
        )
        .unwrap_err();
        assert!(matches!(err, RecurrenceError::InvalidEvent(_)));
    }

    #[test]
    fn test_event_allows_zero_duration() {
        let event = CalendarEvent::new(
            Uuid::nil(),
            Uuid::nil(),
            "Deadline",
            dt(2026, 3, 2, 17),
            dt(2026, 3, 2, 17),
        )
        .unwrap();
        assert_eq!(event.duration(), Duration::zero());
    }

    #[test]
    fn test_event_deserialize_validates() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "tenant_id": "00000000-0000-0000-0000-000000000002",
            "title": "Broken",
            "start": "2026-03-02T10:00:00",
            "end": "2026-03-01T10:00:00"
        }"#;
        let err = serde_json::from_str::<CalendarEvent>(json).unwrap_err();
        assert!(err.to_string().contains("Invalid event"), "got: {err}");
    }

    #[test]
    fn test_overlap_half_open() {
        let start = dt(2026, 3, 2, 9);
        let end = dt(2026, 3, 2, 10);
        assert!(intervals_overlap(start, end, dt(2026, 3, 2, 9), dt(2026, 3, 2, 12)));
        // Touching at the boundary is not an overlap
        assert!(!intervals_overlap(start, end, end, dt(2026, 3, 2, 12)));
        assert!(!intervals_overlap(start, end, dt(2026, 3, 2, 8), start));
    }

    #[test]
    fn test_overlap_zero_width_window() {
        let start = dt(2026, 3, 2, 9);
        let end = dt(2026, 3, 2, 10);
        assert!(intervals_overlap(start, end, start, start));
        assert!(!intervals_overlap(start, end, end, end));
    }

    #[test]
    fn test_overlap_zero_duration_event() {
        let at = dt(2026, 3, 2, 9);
        assert!(intervals_overlap(at, at, at, at));
        assert!(intervals_overlap(at, at, at, dt(2026, 3, 2, 10)));
        assert!(!intervals_overlap(at, at, dt(2026, 3, 2, 8), at));
    }

    #[test]
    fn test_original_start_defaults_to_start() {
        let occurrence = Occurrence::new(Uuid::nil(), dt(2026, 3, 2, 9), dt(2026, 3, 2, 10), 0);
        assert_eq!(occurrence.original_start(), dt(2026, 3, 2, 9));
        assert_eq!(occurrence.end, dt(2026, 3, 2, 10));
    }
}
