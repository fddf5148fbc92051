//! Occurrence generation: {event, pattern} → ascending occurrence sequence.
//!
//! Every recurrence type is expressed as a closed-form map from a *slot*
//! number to a date. Slot 0 is the anchor's period (day, week block, month,
//! year); slots that would land before the anchor's date are skipped, so the
//! occurrence with sequence index `n` is slot `n + skip`. Because the map is
//! closed-form, the generator can start at any index without walking the
//! series from the anchor, which is what the windowed query relies on.
//!
//! The time of day of every occurrence is the anchor's time of day.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ExpansionLimits;
use crate::error::{RecurrenceError, Result};
use crate::event::{CalendarEvent, Occurrence};
use crate::pattern::{RecurrencePattern, RecurrenceType, Termination};

/// Why an expansion stopped before the series' own termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// The per-call occurrence ceiling was reached.
    OccurrenceCeiling,
    /// The next occurrence would start beyond the maximum span from the anchor.
    SpanCeiling,
    /// The caller's cancellation flag was raised.
    Cancelled,
}

/// Per-type slot arithmetic, resolved against the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cadence {
    Once,
    Daily {
        step_days: i64,
    },
    Weekly {
        /// Sunday of the anchor's week.
        block_start: NaiveDate,
        block_days: i64,
        /// Days from Sunday of each flagged weekday, ascending.
        offsets: Vec<i64>,
    },
    Monthly {
        /// `year * 12 + month0` of the anchor.
        first_month: i64,
        step_months: i64,
        day: u32,
    },
    Yearly {
        first_year: i64,
        step_years: i64,
        month: u32,
        day: u32,
    },
}

impl Cadence {
    fn slot_date(&self, anchor: NaiveDate, slot: u64) -> Option<NaiveDate> {
        match self {
            Cadence::Once => (slot == 0).then_some(anchor),
            Cadence::Daily { step_days } => {
                let days = i64::try_from(slot).ok()?.checked_mul(*step_days)?;
                anchor.checked_add_days(Days::new(u64::try_from(days).ok()?))
            }
            Cadence::Weekly {
                block_start,
                block_days,
                offsets,
            } => {
                let per_block = offsets.len() as u64;
                let block = i64::try_from(slot / per_block).ok()?;
                let offset = offsets[(slot % per_block) as usize];
                let days = block.checked_mul(*block_days)?.checked_add(offset)?;
                block_start.checked_add_days(Days::new(u64::try_from(days).ok()?))
            }
            Cadence::Monthly {
                first_month,
                step_months,
                day,
            } => {
                let month_index =
                    first_month.checked_add(i64::try_from(slot).ok()?.checked_mul(*step_months)?)?;
                let year = i32::try_from(month_index.div_euclid(12)).ok()?;
                let month = u32::try_from(month_index.rem_euclid(12)).ok()? + 1;
                clamped_date(year, month, *day)
            }
            Cadence::Yearly {
                first_year,
                step_years,
                month,
                day,
            } => {
                let year =
                    first_year.checked_add(i64::try_from(slot).ok()?.checked_mul(*step_years)?)?;
                clamped_date(i32::try_from(year).ok()?, *month, *day)
            }
        }
    }

    /// A slot number no greater than the first slot whose date is on or
    /// after `target`. Every slot below it falls strictly before `target`.
    fn lower_bound_slot(&self, anchor: NaiveDate, target: NaiveDate) -> u64 {
        let floor_div = |numerator: i64, denominator: i64| -> u64 {
            if numerator <= 0 {
                0
            } else {
                (numerator / denominator) as u64
            }
        };
        match self {
            Cadence::Once => 0,
            Cadence::Daily { step_days } => {
                floor_div((target - anchor).num_days(), *step_days)
            }
            Cadence::Weekly {
                block_start,
                block_days,
                offsets,
            } => {
                let block = floor_div((target - *block_start).num_days(), *block_days);
                block.saturating_mul(offsets.len() as u64)
            }
            Cadence::Monthly {
                first_month,
                step_months,
                ..
            } => {
                let target_month = i64::from(target.year()) * 12 + i64::from(target.month0());
                floor_div(target_month - first_month, *step_months)
            }
            Cadence::Yearly {
                first_year,
                step_years,
                ..
            } => floor_div(i64::from(target.year()) - first_year, *step_years),
        }
    }
}

/// Last valid day of `month` in `year`.
pub(crate) fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (ny, nm) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let first_next = NaiveDate::from_ymd_opt(ny, nm, 1)?;
    Some(first_next.pred_opt()?.day())
}

/// `day` in `month`, clamped down to the month's last day.
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.min(last_day_of_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Result of asking for the occurrence at one sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Slot {
    Occurrence(Occurrence),
    /// The series ended by its own termination rule (or the calendar ran out).
    Finished,
    /// The occurrence exists but starts past the span ceiling.
    BeyondSpan,
}

/// Pure, restartable generator for one event's occurrences.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use recurrence_engine::{CalendarEvent, OccurrenceGenerator, RecurrencePattern};
/// use uuid::Uuid;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let end = start + chrono::Duration::hours(1);
/// let event = CalendarEvent::new(Uuid::nil(), Uuid::nil(), "Rent", start, end).unwrap();
/// let pattern = RecurrencePattern::monthly(1).on_day(31).count(4).build().unwrap();
///
/// let generator = OccurrenceGenerator::new(&event, &pattern).unwrap();
/// let days: Vec<u32> = generator
///     .iter()
///     .map(|o| chrono::Datelike::day(&o.start))
///     .collect();
/// assert_eq!(days, vec![31, 29, 31, 30]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceGenerator {
    event_id: Uuid,
    anchor: NaiveDateTime,
    duration: Duration,
    cadence: Cadence,
    termination: Termination,
    skip: u64,
    limits: ExpansionLimits,
    span_limit: NaiveDateTime,
}

impl OccurrenceGenerator {
    /// Create a generator with the default [`ExpansionLimits`].
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError::InvalidPattern`](crate::RecurrenceError::InvalidPattern)
    /// if the pattern fails validation, or
    /// [`RecurrenceError::InvalidEvent`](crate::RecurrenceError::InvalidEvent)
    /// if the event ends before it starts.
    pub fn new(event: &CalendarEvent, pattern: &RecurrencePattern) -> Result<Self> {
        Self::with_limits(event, pattern, ExpansionLimits::default())
    }

    /// Create a generator with explicit safety limits.
    ///
    /// # Errors
    ///
    /// As [`OccurrenceGenerator::new`], plus
    /// [`RecurrenceError::InvalidConfig`](crate::RecurrenceError::InvalidConfig)
    /// for zero limits.
    pub fn with_limits(
        event: &CalendarEvent,
        pattern: &RecurrencePattern,
        limits: ExpansionLimits,
    ) -> Result<Self> {
        pattern.validate()?;
        event.validate()?;
        limits.validate()?;

        let anchor = event.start;
        let anchor_date = anchor.date();
        let interval = i64::from(pattern.interval());

        let cadence = match pattern.recurrence_type() {
            RecurrenceType::None => Cadence::Once,
            RecurrenceType::Daily => Cadence::Daily {
                step_days: interval,
            },
            RecurrenceType::Weekly => {
                let anchor_offset = i64::from(anchor_date.weekday().num_days_from_sunday());
                let block_start = anchor_date
                    .checked_sub_days(Days::new(anchor_offset.unsigned_abs()))
                    .ok_or_else(|| {
                        RecurrenceError::InvalidEvent(format!(
                            "week of anchor {anchor_date} is out of range"
                        ))
                    })?;
                Cadence::Weekly {
                    block_start,
                    block_days: interval * 7,
                    offsets: pattern.days_of_week().sunday_offsets(),
                }
            }
            RecurrenceType::Monthly => Cadence::Monthly {
                first_month: i64::from(anchor_date.year()) * 12 + i64::from(anchor_date.month0()),
                step_months: interval,
                day: pattern.effective_day_of_month(anchor),
            },
            RecurrenceType::Yearly => Cadence::Yearly {
                first_year: i64::from(anchor_date.year()),
                step_years: interval,
                month: pattern.effective_month_of_year(anchor),
                day: anchor_date.day(),
            },
        };

        let skip = match &cadence {
            Cadence::Weekly { offsets, .. } => {
                let anchor_offset = i64::from(anchor_date.weekday().num_days_from_sunday());
                offsets.iter().filter(|offset| **offset < anchor_offset).count() as u64
            }
            Cadence::Monthly { .. } | Cadence::Yearly { .. } => {
                match cadence.slot_date(anchor_date, 0) {
                    Some(first) if first < anchor_date => 1,
                    _ => 0,
                }
            }
            Cadence::Once | Cadence::Daily { .. } => 0,
        };

        let span_limit = anchor
            .checked_add_months(Months::new(limits.max_span_years.saturating_mul(12)))
            .unwrap_or(NaiveDateTime::MAX);

        tracing::trace!(
            event_id = %event.id,
            recurrence_type = %pattern.recurrence_type(),
            interval = pattern.interval(),
            skip,
            "Built occurrence generator"
        );

        Ok(Self {
            event_id: event.id,
            anchor,
            duration: event.duration(),
            cadence,
            termination: pattern.termination(),
            skip,
            limits,
            span_limit,
        })
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn limits(&self) -> ExpansionLimits {
        self.limits
    }

    /// Latest start the safety ceiling allows.
    pub fn span_limit(&self) -> NaiveDateTime {
        self.span_limit
    }

    fn time_of_day(&self) -> NaiveTime {
        self.anchor.time()
    }

    /// Start of the occurrence at `index`, ignoring termination and limits.
    ///
    /// Returns `None` only when the date is not representable.
    pub fn nominal_start(&self, index: u32) -> Option<NaiveDateTime> {
        let slot = u64::from(index).checked_add(self.skip)?;
        let date = self.cadence.slot_date(self.anchor.date(), slot)?;
        Some(date.and_time(self.time_of_day()))
    }

    pub(crate) fn slot(&self, index: u32) -> Slot {
        if let Termination::Count(count) = self.termination {
            if index >= count {
                return Slot::Finished;
            }
        }
        if self.cadence == Cadence::Once && index > 0 {
            return Slot::Finished;
        }
        let Some(start) = self.nominal_start(index) else {
            return Slot::Finished;
        };
        if let Termination::Until(end_date) = self.termination {
            if start.date() > end_date {
                return Slot::Finished;
            }
        }
        if start > self.span_limit {
            return Slot::BeyondSpan;
        }
        let Some(end) = start.checked_add_signed(self.duration) else {
            return Slot::Finished;
        };
        Slot::Occurrence(Occurrence::new(self.event_id, start, end, index))
    }

    /// The occurrence at `index`, if the series (and the span ceiling) reach it.
    pub fn occurrence_at(&self, index: u32) -> Option<Occurrence> {
        match self.slot(index) {
            Slot::Occurrence(occurrence) => Some(occurrence),
            Slot::Finished | Slot::BeyondSpan => None,
        }
    }

    /// An index no greater than that of the first occurrence starting at or
    /// after `instant`, computed in constant time.
    pub fn lower_bound_index(&self, instant: NaiveDateTime) -> u32 {
        let slot = self
            .cadence
            .lower_bound_slot(self.anchor.date(), instant.date());
        u32::try_from(slot.saturating_sub(self.skip)).unwrap_or(u32::MAX)
    }

    /// Iterate the series from its first occurrence.
    pub fn iter(&self) -> Occurrences<'_> {
        self.iter_from(0)
    }

    /// Iterate the series starting at sequence index `index`.
    ///
    /// The occurrence ceiling counts occurrences produced by this iterator,
    /// not the absolute index.
    pub fn iter_from(&self, index: u32) -> Occurrences<'_> {
        Occurrences {
            generator: self,
            next_index: Some(index),
            produced: 0,
            stop: None,
            cancel: None,
        }
    }

    /// First occurrence starting at or after `instant`.
    pub fn next_after(&self, instant: NaiveDateTime) -> Option<Occurrence> {
        self.iter_from(self.lower_bound_index(instant))
            .find(|occurrence| occurrence.start >= instant)
    }

    /// The occurrence starting exactly at `start`, if the series has one.
    pub fn occurrence_at_start(&self, start: NaiveDateTime) -> Option<Occurrence> {
        self.iter_from(self.lower_bound_index(start))
            .take_while(|occurrence| occurrence.start <= start)
            .find(|occurrence| occurrence.start == start)
    }

    /// Sequence index of the occurrence starting exactly at `start`.
    pub fn index_of(&self, start: NaiveDateTime) -> Option<u32> {
        self.occurrence_at_start(start)
            .map(|occurrence| occurrence.sequence_index)
    }

    pub fn contains(&self, start: NaiveDateTime) -> bool {
        self.index_of(start).is_some()
    }
}

/// How an [`Occurrences`] iterator ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The series ran out on its own.
    Finished,
    /// A safety ceiling or cancellation cut the series short.
    Truncated(TruncationReason),
}

/// Lazy iterator over a generator's occurrences.
///
/// After it returns `None`, [`Occurrences::stop_reason`] tells whether the
/// series finished or was truncated.
#[derive(Debug)]
pub struct Occurrences<'a> {
    generator: &'a OccurrenceGenerator,
    next_index: Option<u32>,
    produced: u32,
    stop: Option<StopReason>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Occurrences<'a> {
    /// Check `flag` before producing each occurrence; once it is set the
    /// iterator stops with [`TruncationReason::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// Index the iterator would produce next.
    pub fn next_index(&self) -> Option<u32> {
        self.next_index
    }

    fn halt(&mut self, reason: StopReason) -> Option<Occurrence> {
        self.stop = Some(reason);
        None
    }
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        if self.stop.is_some() {
            return None;
        }
        let Some(index) = self.next_index else {
            return self.halt(StopReason::Finished);
        };
        if self
            .cancel
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return self.halt(StopReason::Truncated(TruncationReason::Cancelled));
        }
        let slot = self.generator.slot(index);
        if self.produced >= self.generator.limits.max_occurrences {
            let reason = match slot {
                Slot::Finished => StopReason::Finished,
                Slot::Occurrence(_) | Slot::BeyondSpan => {
                    StopReason::Truncated(TruncationReason::OccurrenceCeiling)
                }
            };
            return self.halt(reason);
        }
        match slot {
            Slot::Occurrence(occurrence) => {
                self.produced += 1;
                self.next_index = index.checked_add(1);
                Some(occurrence)
            }
            Slot::Finished => self.halt(StopReason::Finished),
            Slot::BeyondSpan => self.halt(StopReason::Truncated(TruncationReason::SpanCeiling)),
        }
    }
}
