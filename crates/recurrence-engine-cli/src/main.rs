mod commands;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// recur - expand recurring calendar events and render calendar views
#[derive(Parser, Debug)]
#[command(name = "recur")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Reference "now" as a local timestamp (e.g. 2026-03-02T09:00:00)
    #[arg(long, global = true)]
    now: Option<NaiveDateTime>,

    /// IANA timezone used to read the clock when --now is absent
    #[arg(long, global = true, default_value = "UTC")]
    timezone: String,

    /// JSON file with expansion and range limits
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// First day of the week for week views
    #[arg(long, global = true, value_enum, default_value_t = WeekStart::Monday)]
    week_start: WeekStart,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Expand each event's occurrences overlapping [from, to)
    Expand {
        /// JSON file of scheduled events, or - for stdin
        input: PathBuf,
        #[arg(long)]
        from: NaiveDateTime,
        #[arg(long)]
        to: NaiveDateTime,
    },
    /// List calendar items overlapping [from, to)
    Range {
        input: PathBuf,
        #[arg(long)]
        from: NaiveDateTime,
        #[arg(long)]
        to: NaiveDateTime,
    },
    /// Items on one day, split into all-day and timed
    Day {
        input: PathBuf,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Seven day buckets for the week containing a date
    Week {
        input: PathBuf,
        #[arg(long)]
        date: NaiveDate,
    },
    /// One day bucket per day of a month
    Month {
        input: PathBuf,
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },
    /// Items overlapping the next N days
    Upcoming {
        input: PathBuf,
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Occurrences starting within the reminder look-ahead
    Due {
        input: PathBuf,
        #[arg(long, default_value_t = 15)]
        minutes: i64,
    },
    /// Print each recurring event's RRULE and summary
    Rrule { input: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum WeekStart {
    Monday,
    Sunday,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recurrence_engine=info,recur=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = commands::run(&cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
