use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike};
use chrono_tz::Tz;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::scoring::{importance, ShareBoost};
use super::window::DAY_START_HOUR;
use crate::error::Result;
use crate::models::{Column, Event, EventOrPadding};

pub const BOOKED_HEADER: &str = "Booked";

#[derive(Serialize, Clone, Debug)]
pub struct DayLayout {
    pub columns: Vec<Column>,
    pub first_hour: u32,
    pub hour_count: i64,
}

impl DayLayout {
    fn empty() -> Self {
        Self {
            columns: Vec::new(),
            first_hour: DAY_START_HOUR,
            hour_count: 0,
        }
    }

    /// Hex SHA-256 of the layout's JSON form.
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

pub fn layout_category(event: &Event) -> &str {
    if event.booked() {
        BOOKED_HEADER
    } else {
        &event.category
    }
}

fn truncate_to_hour(instant: DateTime<Tz>) -> DateTime<Tz> {
    instant
        - Duration::seconds(i64::from(instant.minute() * 60 + instant.second()))
        - Duration::nanoseconds(i64::from(instant.nanosecond()))
}

struct ColumnTracker {
    end: DateTime<Tz>,
    entries: Vec<EventOrPadding>,
}

impl ColumnTracker {
    fn open(day_start: DateTime<Tz>, event: Event) -> Self {
        let mut entries = Vec::with_capacity(3);
        if event.start > day_start {
            entries.push(EventOrPadding::padding(event.start - day_start));
        }
        let end = event.end();
        entries.push(EventOrPadding::event(event));
        Self { end, entries }
    }

    fn fits(&self, event: &Event) -> bool {
        self.end <= event.start
    }

    fn place(&mut self, event: Event) {
        if event.start > self.end {
            self.entries
                .push(EventOrPadding::padding(event.start - self.end));
        }
        self.end = event.end();
        self.entries.push(EventOrPadding::event(event));
    }

    fn close(mut self, day_end: DateTime<Tz>) -> Vec<EventOrPadding> {
        if day_end > self.end {
            self.entries.push(EventOrPadding::padding(day_end - self.end));
        }
        self.entries
    }
}

/// Packs events into the fewest columns per layout category, pads every
/// column to the visible day and ranks columns by total importance.
pub fn pack_columns(mut events: Vec<Event>, boost: ShareBoost) -> DayLayout {
    if events.is_empty() {
        return DayLayout::empty();
    }
    events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title)));

    let day_start = truncate_to_hour(events[0].start);
    let latest_end = events
        .iter()
        .map(Event::end)
        .fold(events[0].end(), std::cmp::max);
    let day_end = truncate_to_hour(latest_end) + Duration::hours(1);
    let hour_count = (day_end - day_start).num_hours();

    let mut categories: Vec<(String, Vec<ColumnTracker>)> = Vec::new();
    let mut category_index: HashMap<String, usize> = HashMap::new();

    for event in events {
        let category = layout_category(&event).to_string();
        let index = *category_index.entry(category.clone()).or_insert_with(|| {
            categories.push((category, Vec::new()));
            categories.len() - 1
        });
        let columns = &mut categories[index].1;
        match columns.iter_mut().find(|column| column.fits(&event)) {
            Some(column) => column.place(event),
            None => columns.push(ColumnTracker::open(day_start, event)),
        }
    }

    let mut columns: Vec<Column> = categories
        .into_iter()
        .flat_map(|(header, trackers)| {
            trackers.into_iter().map(move |tracker| {
                let entries = tracker.close(day_end);
                let importance: i64 = entries
                    .iter()
                    .filter_map(EventOrPadding::as_event)
                    .map(|event| importance(event, boost))
                    .sum();
                Column {
                    header: header.clone(),
                    importance,
                    entries,
                }
            })
        })
        .collect();
    columns.sort_by(|a, b| b.importance.cmp(&a.importance));

    DayLayout {
        columns,
        first_hour: day_start.hour(),
        hour_count,
    }
}
