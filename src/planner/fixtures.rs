use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::{Europe::London, Tz};

use super::{PerformanceRow, RowSource, Sharer, SocialGraph, VenueRow};
use crate::error::{PlannerError, Result};
use crate::models::{Event, Interest, Venue};

pub fn local(text: &str) -> DateTime<Tz> {
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M").expect("fixture time");
    London
        .from_local_datetime(&naive)
        .single()
        .expect("unambiguous fixture time")
}

pub fn row(
    show_id: i64,
    performance_id: i64,
    title: &str,
    category: &str,
    start: &str,
    minutes: i64,
) -> PerformanceRow {
    PerformanceRow {
        show_id,
        title: title.to_string(),
        category: category.to_string(),
        duration: Duration::minutes(minutes),
        booking_url: format!("https://tickets.example.com/shows/{show_id}"),
        performance_id,
        start_utc: local(start).with_timezone(&Utc),
        venue: Some(VenueRow {
            name: "Assembly Rooms".to_string(),
            latlong: Some("(55.953,-3.199)".to_string()),
        }),
        show_interest: None,
        performance_interest: None,
        sold_out: false,
    }
}

impl PerformanceRow {
    pub fn show_interest(mut self, interest: &str) -> Self {
        self.show_interest = Some(interest.to_string());
        self
    }

    pub fn performance_interest(mut self, interest: &str) -> Self {
        self.performance_interest = Some(interest.to_string());
        self
    }

    pub fn sold_out(mut self) -> Self {
        self.sold_out = true;
        self
    }

    pub fn without_venue(mut self) -> Self {
        self.venue = None;
        self
    }
}

pub fn event(
    performance_id: i64,
    title: &str,
    category: &str,
    start: &str,
    minutes: i64,
) -> Event {
    Event {
        show_id: performance_id,
        performance_id,
        user_id: 1,
        user_email: None,
        title: title.to_string(),
        category: category.to_string(),
        venue: Venue::new("Assembly Rooms", None),
        booking_url: String::new(),
        start: local(start),
        duration: Duration::minutes(minutes),
        show_interest: None,
        performance_interest: None,
        last_chance: false,
        shared_interests: Vec::new(),
    }
}

pub fn booked(mut event: Event) -> Event {
    event.performance_interest = Some(Interest::Booked);
    event.show_interest = Some(Interest::Booked);
    event
}

pub fn with_interest(mut event: Event, interest: Interest) -> Event {
    event.show_interest = Some(interest);
    event
}

/// In-memory row source and social graph keyed by user id.
#[derive(Default)]
pub struct Catalogue {
    rows: HashMap<i64, Vec<PerformanceRow>>,
    shares: HashMap<i64, Vec<Sharer>>,
}

impl Catalogue {
    pub fn add_rows(&mut self, user_id: i64, rows: Vec<PerformanceRow>) {
        self.rows.entry(user_id).or_default().extend(rows);
    }

    /// `sharer` grants `viewer` read access.
    pub fn add_share(&mut self, viewer: i64, sharer: i64, email: Option<&str>) {
        self.shares.entry(viewer).or_default().push(Sharer {
            user_id: sharer,
            email: email.map(str::to_string),
        });
    }
}

impl RowSource for Catalogue {
    fn performance_rows(&self, user_id: i64) -> Result<Vec<PerformanceRow>> {
        self.rows
            .get(&user_id)
            .cloned()
            .ok_or_else(|| PlannerError::UnresolvedReference(format!("user {user_id}")))
    }
}

impl SocialGraph for Catalogue {
    fn shared_by(&self, user_id: i64) -> Result<Vec<Sharer>> {
        Ok(self.shares.get(&user_id).cloned().unwrap_or_default())
    }
}
