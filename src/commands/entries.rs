//! Subcommand plumbing shared by every record type.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use clap::ValueEnum;

use habit_sync::aggregate::daily_series;
use habit_sync::{Draft, Entry, EntryId, EntryStore, HttpGateway, Payload};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub type Store<P> = EntryStore<P, HttpGateway>;

pub fn print_entries<P: Payload>(
    entries: &[Entry<P>],
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No {} entries.", P::RECORD_TYPE);
                return Ok(());
            }
            for entry in entries {
                println!("{}", entry);
                if let Some(notes) = entry.payload.notes() {
                    println!("    {}", notes);
                }
            }
        }
    }
    Ok(())
}

/// Creates an entry and reports the outcome once the server answers.
pub async fn add_entry<P: Payload>(
    store: &Store<P>,
    draft: Draft<P>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pending = store.create(draft);
    match pending.await {
        Ok(entry) => {
            println!("Logged {}", entry);
            Ok(())
        }
        Err(e) => {
            eprintln!("Not saved; the entry was rolled back.");
            Err(e.into())
        }
    }
}

pub async fn delete_entry<P: Payload>(
    store: &Store<P>,
    id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = EntryId::from(id);
    let existing = store.with_entries(|entries| entries.iter().find(|e| e.id == id).cloned());

    store.delete(&id).await?;
    match existing {
        Some(entry) => println!("Deleted {}", entry),
        None => println!("Deleted {}", id),
    }
    Ok(())
}

/// Prints one line per day for the last `days` days, today included.
pub fn print_history<P: Payload>(
    entries: &[Entry<P>],
    days: u32,
    label: &str,
    value: impl Fn(&P) -> f64,
) {
    let to = Local::now().date_naive();
    let from = to - chrono::Duration::days(i64::from(days.max(1)) - 1);

    for (day, total) in daily_series(entries, from, to, &Local, value) {
        println!("{}  {:>8.1} {}", day.format("%Y-%m-%d %a"), total, label);
    }
}

/// Parses `--at`: either `YYYY-MM-DD HH:MM` or `HH:MM` (today).
pub fn parse_timestamp(input: &str) -> Result<i64, String> {
    let input = input.trim();
    let naive = if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M") {
        datetime
    } else if let Ok(time) = NaiveTime::parse_from_str(input, "%H:%M") {
        Local::now().date_naive().and_time(time)
    } else if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN))
    } else {
        return Err(format!(
            "Invalid time '{}'. Use YYYY-MM-DD HH:MM, YYYY-MM-DD or HH:MM",
            input
        ));
    };

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp_millis())
        .ok_or_else(|| format!("Time '{}' does not exist in the local time zone", input))
}

/// Builds a draft, backdated when `--at` was given.
pub fn draft_at<P>(payload: P, at: Option<&str>) -> Result<Draft<P>, String> {
    let draft = Draft::new(payload);
    match at {
        Some(at) => Ok(draft.at(parse_timestamp(at)?)),
        None => Ok(draft),
    }
}
