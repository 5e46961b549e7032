use std::{fs, path::Path};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::db::{NewShow, Store};
use crate::error::{PlannerError, Result};
use crate::planner::window::resolve_local;

pub const HEADINGS: [&str; 8] = [
    "Title",
    "Category",
    "Venue",
    "Duration",
    "Times",
    "Dates",
    "Book Tickets",
    "Group Name",
];

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueEntry {
    pub title: String,
    pub category: String,
    pub venue: String,
    pub duration: Duration,
    pub booking_url: String,
    pub performances: Vec<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub shows: usize,
    pub performances: usize,
}

/// Parses durations written as unit pairs, e.g. `1 hour 50 minutes`.
pub fn parse_duration(human: &str) -> Result<Duration> {
    let tokens: Vec<&str> = human.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 2 != 0 {
        return Err(PlannerError::MalformedInput(format!(
            "duration {human:?} needs value/unit pairs"
        )));
    }
    let mut total = Duration::zero();
    for pair in tokens.chunks(2) {
        let value: i64 = pair[0].parse().map_err(|_| {
            PlannerError::MalformedInput(format!("duration {human:?}: {:?} is not a number", pair[0]))
        })?;
        let part = match pair[1] {
            "hour" | "hours" => Duration::try_hours(value),
            "minute" | "minutes" => Duration::try_minutes(value),
            unit => {
                return Err(PlannerError::MalformedInput(format!(
                    "duration {human:?}: unknown unit {unit:?}"
                )))
            }
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| PlannerError::MalformedInput(format!("duration {human:?} out of range")))?;
    }
    Ok(total)
}

/// Reads a `10 Aug` date and `14:30` time as local time in `tz`.
pub fn parse_date_time(date: &str, time: &str, year: i32, tz: Tz) -> Result<DateTime<Utc>> {
    let text = format!("{year} {} {}", date.trim(), time.trim());
    let naive = NaiveDateTime::parse_from_str(&text, "%Y %d %b %H:%M")
        .map_err(|err| PlannerError::MalformedInput(format!("date/time {text:?}: {err}")))?;
    Ok(resolve_local(&naive, tz)?.with_timezone(&Utc))
}

/// Decodes UTF-16 exports (byte-order mark required) as well as UTF-8.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    fn utf16(rest: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
        if rest.len() % 2 != 0 {
            return Err(PlannerError::MalformedInput(
                "utf-16 catalogue has a trailing odd byte".to_string(),
            ));
        }
        let units: Vec<u16> = rest.chunks_exact(2).map(|c| unit([c[0], c[1]])).collect();
        String::from_utf16(&units)
            .map_err(|err| PlannerError::MalformedInput(format!("utf-16 catalogue: {err}")))
    }

    match bytes {
        [0xFF, 0xFE, rest @ ..] => utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, u16::from_be_bytes),
        _ => {
            let text = std::str::from_utf8(bytes)
                .map_err(|err| PlannerError::MalformedInput(format!("utf-8 catalogue: {err}")))?;
            Ok(text.trim_start_matches('\u{feff}').to_string())
        }
    }
}

fn malformed_record(err: csv::Error) -> PlannerError {
    PlannerError::MalformedInput(format!("catalogue: {err}"))
}

/// Reads the tab-separated export. Fields may be quoted.
pub fn parse_catalogue(text: &str, year: i32, tz: Tz) -> Result<Vec<CatalogueEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headings = reader.headers().map_err(malformed_record)?;
    if headings.iter().ne(HEADINGS) {
        return Err(PlannerError::MalformedInput(format!(
            "wrong catalogue headings; got {headings:?}, want {HEADINGS:?}"
        )));
    }

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed_record)?;
        let fields: Vec<&str> = record.iter().collect();
        let [title, category, venue, duration, times, dates, booking_url, _group] = fields[..]
        else {
            return Err(PlannerError::MalformedInput(format!(
                "catalogue line {} has {} fields, want {}",
                record.position().map_or(0, |pos| pos.line()),
                fields.len(),
                HEADINGS.len()
            )));
        };

        let mut performances = Vec::new();
        for date in dates.split(", ") {
            for time in times.split(", ") {
                performances.push(parse_date_time(date, time, year, tz)?);
            }
        }

        entries.push(CatalogueEntry {
            title: title.to_string(),
            category: category.to_string(),
            venue: venue.to_string(),
            duration: parse_duration(duration)?,
            booking_url: booking_url.to_string(),
            performances,
        });
    }
    Ok(entries)
}

/// Upserts shows and performances. Venues must already be known.
pub fn import_catalogue(store: &Store, entries: &[CatalogueEntry]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    for entry in entries {
        let venue_id = store.lookup_venue_id(&entry.venue)?;
        let show_id = store.upsert_show(&NewShow {
            booking_url: &entry.booking_url,
            title: &entry.title,
            category: &entry.category,
            venue_id,
            duration: entry.duration,
        })?;
        for start in &entry.performances {
            store.insert_performance(show_id, *start)?;
        }
        summary.shows += 1;
        summary.performances += entry.performances.len();
    }
    log::info!(
        "imported {} shows with {} performances",
        summary.shows,
        summary.performances
    );
    Ok(summary)
}

pub fn import_file(store: &Store, path: &Path, year: i32, tz: Tz) -> Result<ImportSummary> {
    let bytes = fs::read(path)?;
    let text = decode_text(&bytes)?;
    let entries = parse_catalogue(&text, year, tz)?;
    import_catalogue(store, &entries)
}
