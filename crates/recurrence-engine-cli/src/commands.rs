use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use recurrence_engine::{
    CalendarQueryService, EngineConfig, OccurrenceWindow, RecurrenceError, RecurrencePattern,
    ScheduledEvent, WeekStartDay, WindowedQuery,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{Cli, Command, WeekStart};

#[derive(Serialize)]
struct ExpandedEvent {
    event_id: Uuid,
    title: String,
    #[serde(flatten)]
    window: OccurrenceWindow,
}

#[derive(Serialize)]
struct RuleSummary {
    event_id: Uuid,
    title: String,
    rrule: Option<String>,
    description: String,
}

/// Execute the selected subcommand and return its JSON output.
pub fn run(cli: &Cli) -> Result<Value> {
    let config = load_config(cli.config.as_deref())?;
    let now = resolve_now(cli.now, &cli.timezone)?;
    tracing::debug!(%now, timezone = %cli.timezone, "Resolved reference time");

    let service = CalendarQueryService::with_policy(now, config.ranges)
        .expansion_limits(config.expansion)
        .week_start(match cli.week_start {
            WeekStart::Monday => WeekStartDay::Monday,
            WeekStart::Sunday => WeekStartDay::Sunday,
        });

    let value = match &cli.command {
        Command::Expand { input, from, to } => {
            let events = load_events(input)?;
            let expanded = expand(&events, config, *from, *to)?;
            serde_json::to_value(expanded)?
        }
        Command::Range { input, from, to } => {
            let events = load_events(input)?;
            serde_json::to_value(service.range(&events, *from, *to)?)?
        }
        Command::Day { input, date } => {
            let events = load_events(input)?;
            serde_json::to_value(service.day_view(&events, *date)?)?
        }
        Command::Week { input, date } => {
            let events = load_events(input)?;
            serde_json::to_value(service.week_view(&events, *date)?)?
        }
        Command::Month { input, year, month } => {
            let events = load_events(input)?;
            serde_json::to_value(service.month_view(&events, *year, *month)?)?
        }
        Command::Upcoming { input, days } => {
            let events = load_events(input)?;
            serde_json::to_value(service.upcoming(&events, *days)?)?
        }
        Command::Due { input, minutes } => {
            let events = load_events(input)?;
            let lookahead = Duration::try_minutes(*minutes).ok_or_else(|| {
                RecurrenceError::InvalidRange(format!(
                    "reminder look-ahead of {minutes} minutes is out of range"
                ))
            })?;
            serde_json::to_value(service.starting_within(&events, lookahead)?)?
        }
        Command::Rrule { input } => {
            let events = load_events(input)?;
            serde_json::to_value(summaries(&events))?
        }
    };
    Ok(value)
}

fn expand(
    events: &[ScheduledEvent],
    config: EngineConfig,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<ExpandedEvent>> {
    let once = RecurrencePattern::once();
    events
        .iter()
        .map(|scheduled| {
            let pattern = scheduled.pattern.as_ref().unwrap_or(&once);
            let window = WindowedQuery::new(&scheduled.event, pattern)
                .limits(config.expansion)
                .overrides(&scheduled.overrides)
                .run(from, to)
                .with_context(|| format!("failed to expand event {}", scheduled.event.id))?;
            Ok(ExpandedEvent {
                event_id: scheduled.event.id,
                title: scheduled.event.title.clone(),
                window,
            })
        })
        .collect()
}

fn summaries(events: &[ScheduledEvent]) -> Vec<RuleSummary> {
    events
        .iter()
        .map(|scheduled| {
            let pattern = scheduled.pattern.clone().unwrap_or_else(RecurrencePattern::once);
            RuleSummary {
                event_id: scheduled.event.id,
                title: scheduled.event.title.clone(),
                rrule: pattern.to_rrule(),
                description: pattern.describe(),
            }
        })
        .collect()
}

fn resolve_now(explicit: Option<NaiveDateTime>, timezone: &str) -> Result<NaiveDateTime> {
    if let Some(now) = explicit {
        return Ok(now);
    }
    let tz: Tz = timezone
        .parse()
        .map_err(|e| anyhow!("unknown timezone '{timezone}': {e}"))?;
    Ok(Utc::now().with_timezone(&tz).naive_local())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    EngineConfig::from_json(&source)
        .with_context(|| format!("failed to load config {}", path.display()))
}

fn load_events(input: &Path) -> Result<Vec<ScheduledEvent>> {
    let source = if input == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read events from stdin")?;
        buffer
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("failed to read events from {}", input.display()))?
    };
    let events: Vec<ScheduledEvent> =
        serde_json::from_str(&source).context("failed to parse scheduled events")?;
    tracing::info!(count = events.len(), "Loaded scheduled events");
    Ok(events)
}
