use std::hint::black_box;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{criterion_group, criterion_main, Criterion};
use recurrence_engine::{occurrences, CalendarEvent, DaysOfWeek, RecurrencePattern};
use uuid::Uuid;

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .expect("valid date")
        .and_hms_opt(9, 0, 0)
        .expect("valid time")
}

fn series(anchor: NaiveDateTime) -> CalendarEvent {
    CalendarEvent::new(
        Uuid::nil(),
        Uuid::nil(),
        "Bench",
        anchor,
        anchor + Duration::minutes(30),
    )
    .expect("valid event")
}

fn bench_distant_windows(c: &mut Criterion) {
    let event = series(at(1950, 1, 1));
    let daily = RecurrencePattern::daily(1)
        .unbounded()
        .build()
        .expect("valid pattern");
    let weekdays = RecurrencePattern::weekly(1, DaysOfWeek::WEEKDAYS)
        .unbounded()
        .build()
        .expect("valid pattern");
    let monthly = RecurrencePattern::monthly(1)
        .on_day(31)
        .unbounded()
        .build()
        .expect("valid pattern");

    let mut group = c.benchmark_group("month_window_decades_after_anchor");
    for (name, pattern) in [("daily", &daily), ("weekdays", &weekdays), ("monthly", &monthly)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                occurrences(
                    black_box(&event),
                    black_box(pattern),
                    black_box(at(2040, 3, 1)),
                    black_box(at(2040, 4, 1)),
                )
            })
        });
    }
    group.finish();
}

fn bench_full_ceiling(c: &mut Criterion) {
    let event = series(at(2000, 1, 1));
    let daily = RecurrencePattern::daily(1)
        .unbounded()
        .build()
        .expect("valid pattern");

    c.bench_function("two_hundred_year_window_truncated", |b| {
        b.iter(|| occurrences(black_box(&event), black_box(&daily), at(2000, 1, 1), at(2200, 1, 1)))
    });
}

criterion_group!(benches, bench_distant_windows, bench_full_ceiling);
criterion_main!(benches);
