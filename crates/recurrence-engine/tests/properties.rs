//! Property tests: closed-form positions, weekday membership, and agreement
//! between the windowed query and a brute-force filter of the full series.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use recurrence_engine::{
    occurrences, CalendarEvent, DaysOfWeek, Occurrence, OccurrenceGenerator, RecurrencePattern,
};
use uuid::Uuid;

fn anchor_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (1990i32..2060, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60).prop_map(|(y, m, d, h, min)| {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("day <= 28 is always valid")
            .and_hms_opt(h, min, 0)
            .expect("valid time")
    })
}

fn pattern_strategy() -> impl Strategy<Value = RecurrencePattern> {
    prop_oneof![
        (1u32..10, 1u32..60).prop_map(|(i, n)| RecurrencePattern::daily(i).count(n).build()),
        (1u32..5, 1u8..=127, 1u32..60).prop_map(|(i, bits, n)| {
            let days = DaysOfWeek::from_bits(bits).expect("bits within 1-127");
            RecurrencePattern::weekly(i, days).count(n).build()
        }),
        (1u32..4, 1u32..=31, 1u32..40)
            .prop_map(|(i, day, n)| RecurrencePattern::monthly(i).on_day(day).count(n).build()),
        (1u32..3, 1u32..=12, 1u32..20)
            .prop_map(|(i, month, n)| RecurrencePattern::yearly(i).in_month(month).count(n).build()),
    ]
    .prop_map(|built| built.expect("strategy only builds valid patterns"))
}

fn event(anchor: NaiveDateTime, minutes: i64) -> CalendarEvent {
    CalendarEvent::new(
        Uuid::from_u128(42),
        Uuid::from_u128(1),
        "Property",
        anchor,
        anchor + Duration::minutes(minutes),
    )
    .expect("non-negative duration")
}

proptest! {
    #[test]
    fn daily_start_is_anchor_plus_n_intervals(
        anchor in anchor_strategy(),
        interval in 1u32..30,
        count in 1u32..200,
    ) {
        let pattern = RecurrencePattern::daily(interval).count(count).build().expect("valid");
        let generator = OccurrenceGenerator::new(&event(anchor, 30), &pattern).expect("generator");
        let all: Vec<Occurrence> = generator.iter().collect();
        prop_assert_eq!(all.len(), count as usize);
        for (n, occurrence) in all.iter().enumerate() {
            prop_assert_eq!(
                occurrence.start,
                anchor + Duration::days(n as i64 * i64::from(interval))
            );
        }
    }

    #[test]
    fn weekly_occurrences_fall_on_flagged_days(
        anchor in anchor_strategy(),
        interval in 1u32..5,
        bits in 1u8..=127,
    ) {
        let days = DaysOfWeek::from_bits(bits).expect("bits within 1-127");
        let pattern = RecurrencePattern::weekly(interval, days).count(40).build().expect("valid");
        let generator = OccurrenceGenerator::new(&event(anchor, 60), &pattern).expect("generator");
        let all: Vec<Occurrence> = generator.iter().collect();

        prop_assert!(!all.is_empty());
        prop_assert!(all[0].start >= anchor);
        for occurrence in &all {
            prop_assert!(days.contains(occurrence.start.weekday()));
            prop_assert_eq!(occurrence.start.time(), anchor.time());
        }
        for pair in all.windows(2) {
            prop_assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn monthly_day_is_requested_or_month_end(
        anchor in anchor_strategy(),
        interval in 1u32..4,
        day in 1u32..=31,
    ) {
        let pattern = RecurrencePattern::monthly(interval).on_day(day).count(36).build().expect("valid");
        let generator = OccurrenceGenerator::new(&event(anchor, 60), &pattern).expect("generator");
        let mut previous_month: Option<i32> = None;
        for occurrence in generator.iter() {
            let date = occurrence.start.date();
            let month_end = date
                .with_day(1)
                .and_then(|first| first.checked_add_months(chrono::Months::new(1)))
                .and_then(|next| next.pred_opt())
                .expect("month end");
            prop_assert!(date.day() == day || (date == month_end && month_end.day() < day));

            let month_index = date.year() * 12 + date.month0() as i32;
            if let Some(previous) = previous_month {
                prop_assert_eq!(month_index - previous, interval as i32);
            }
            previous_month = Some(month_index);
        }
    }

    #[test]
    fn window_equals_brute_force_filter(
        anchor in anchor_strategy(),
        pattern in pattern_strategy(),
        minutes in 0i64..(3 * 24 * 60),
        offset_days in -400i64..4000,
        width_hours in 0i64..(24 * 90),
    ) {
        let series = event(anchor, minutes);
        let window_start = anchor + Duration::days(offset_days);
        let window_end = window_start + Duration::hours(width_hours);

        let window = occurrences(&series, &pattern, window_start, window_end).expect("expand");
        let generator = OccurrenceGenerator::new(&series, &pattern).expect("generator");
        let expected: Vec<Occurrence> = generator
            .iter()
            .filter(|o| o.overlaps(window_start, window_end))
            .collect();

        prop_assert!(!window.truncated);
        prop_assert_eq!(window.occurrences, expected);
    }

    #[test]
    fn windowed_query_is_deterministic(
        anchor in anchor_strategy(),
        pattern in pattern_strategy(),
        offset_days in 0i64..2000,
    ) {
        let series = event(anchor, 45);
        let start = anchor + Duration::days(offset_days);
        let end = start + Duration::days(60);
        let first = occurrences(&series, &pattern, start, end).expect("expand");
        let second = occurrences(&series, &pattern, start, end).expect("expand");
        prop_assert_eq!(
            serde_json::to_vec(&first).expect("serialize"),
            serde_json::to_vec(&second).expect("serialize")
        );
    }

    #[test]
    fn lower_bound_never_skips_an_occurrence(
        anchor in anchor_strategy(),
        pattern in pattern_strategy(),
        offset_days in -100i64..3000,
    ) {
        let series = event(anchor, 30);
        let generator = OccurrenceGenerator::new(&series, &pattern).expect("generator");
        let instant = anchor + Duration::days(offset_days);
        let bound = generator.lower_bound_index(instant);
        for occurrence in generator.iter().take(bound as usize) {
            prop_assert!(occurrence.start < instant);
        }
    }
}
