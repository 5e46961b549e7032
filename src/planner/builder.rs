use chrono_tz::Tz;

use super::social::SharedInterests;
use super::PerformanceRow;
use crate::error::{PlannerError, Result};
use crate::models::{Event, Interest, Venue};

/// The user a batch of events is loaded for.
#[derive(Clone, Debug)]
pub struct Owner {
    pub user_id: i64,
    pub email: Option<String>,
}

/// Sold-out performances only matter once they are booked.
pub fn sold_out_unbooked(row: &PerformanceRow) -> bool {
    row.sold_out && parse_interest(&row.performance_interest) != Some(Interest::Booked)
}

pub fn build_event(
    row: PerformanceRow,
    owner: &Owner,
    last_chance: bool,
    shared: &SharedInterests,
    tz: Tz,
) -> Result<Event> {
    let venue = row.venue.as_ref().ok_or_else(|| {
        PlannerError::UnresolvedReference(format!(
            "venue for performance {} of show {}",
            row.performance_id, row.show_id
        ))
    })?;
    let venue = Venue::new(&venue.name, venue.latlong.as_deref());

    Ok(Event {
        show_id: row.show_id,
        performance_id: row.performance_id,
        user_id: owner.user_id,
        user_email: owner.email.clone(),
        show_interest: parse_interest(&row.show_interest),
        performance_interest: parse_interest(&row.performance_interest),
        start: row.start_utc.with_timezone(&tz),
        duration: row.duration,
        last_chance,
        shared_interests: shared.for_performance(row.performance_id),
        title: row.title,
        category: row.category,
        venue,
        booking_url: row.booking_url,
    })
}

fn parse_interest(raw: &Option<String>) -> Option<Interest> {
    raw.as_deref().and_then(Interest::parse)
}
