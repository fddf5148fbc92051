//! # recurrence-engine
//!
//! Deterministic expansion of recurring calendar events.
//!
//! A [`CalendarEvent`] holds the first occurrence of a series and a
//! [`RecurrencePattern`] describes how it repeats. The engine answers "which
//! occurrences overlap this window?" without walking the series from its
//! anchor: every cadence has a closed-form slot position, so a query for a
//! window decades after the anchor costs the same as one next week.
//!
//! Expansion never fails on large inputs. A per-call occurrence ceiling and a
//! span ceiling bound the work, and results that hit either are returned as a
//! usable prefix flagged `truncated`.
//!
//! ## Modules
//!
//! - [`pattern`]: recurrence pattern records, validation, RRULE export
//! - [`event`]: calendar events, materialized occurrences, overlap rules
//! - [`generator`]: index-addressable occurrence sequences with safety ceilings
//! - [`window`]: windowed queries with closed-form jump-ahead
//! - [`overrides`]: per-occurrence cancellations and reschedules
//! - [`service`]: day, week, month, and upcoming views over candidate events
//! - [`validation`]: business limits on request ranges
//! - [`weekday`]: weekday bitmask and week-start convention
//! - [`config`]: tunable limits
//! - [`error`]: error types
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, NaiveDate};
//! use recurrence_engine::{occurrences, CalendarEvent, DaysOfWeek, RecurrencePattern};
//! use uuid::Uuid;
//!
//! let start = NaiveDate::from_ymd_opt(2025, 1, 7).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! let event = CalendarEvent::new(Uuid::nil(), Uuid::nil(), "1:1", start, start + Duration::minutes(30)).unwrap();
//! let pattern = RecurrencePattern::weekly(2, DaysOfWeek::TUESDAY | DaysOfWeek::THURSDAY)
//!     .count(4)
//!     .build()
//!     .unwrap();
//!
//! let window_start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let window = occurrences(&event, &pattern, window_start, window_start + Duration::days(60)).unwrap();
//! let days: Vec<u32> = window.occurrences.iter().map(|o| chrono::Datelike::day(&o.start)).collect();
//! assert_eq!(days, vec![7, 9, 21, 23]);
//! assert!(!window.truncated);
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod generator;
pub mod overrides;
pub mod pattern;
pub mod service;
pub mod validation;
pub mod weekday;
pub mod window;

pub use config::{EngineConfig, ExpansionLimits, RangeLimits};
pub use error::RecurrenceError;
pub use event::{CalendarEvent, Occurrence};
pub use generator::{OccurrenceGenerator, Occurrences, StopReason, TruncationReason};
pub use overrides::{OccurrenceOverride, OverrideSet};
pub use pattern::{PatternBuilder, RecurrencePattern, RecurrenceType, Termination};
pub use service::{
    CalendarItem, CalendarQueryService, DayView, ItemList, MonthView, Priority, ScheduledEvent,
    WeekView,
};
pub use validation::{RangeKind, RangePolicy, Unrestricted};
pub use weekday::{DaysOfWeek, WeekStartDay};
pub use window::{occurrences, OccurrenceWindow, WindowedQuery};
