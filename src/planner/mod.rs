pub mod builder;
pub mod conflicts;
pub mod filter;
pub mod layout;
pub mod scoring;
pub mod social;
pub mod window;

#[cfg(test)]
pub(crate) mod fixtures;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::Result;
use crate::models::Event;

pub use filter::Filter;
pub use layout::DayLayout;
pub use scoring::ShareBoost;

use builder::Owner;
use social::SharedInterests;
use window::DayWindow;

/// Catalogue rows for one user, restricted to that user's visit window and
/// ordered by start then title.
pub trait RowSource {
    fn performance_rows(&self, user_id: i64) -> Result<Vec<PerformanceRow>>;
}

/// Who has granted a user read access to their schedule.
pub trait SocialGraph {
    fn shared_by(&self, user_id: i64) -> Result<Vec<Sharer>>;
}

#[derive(Clone, Debug)]
pub struct VenueRow {
    pub name: String,
    pub latlong: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PerformanceRow {
    pub show_id: i64,
    pub title: String,
    pub category: String,
    pub duration: Duration,
    pub booking_url: String,
    pub performance_id: i64,
    pub start_utc: DateTime<Utc>,
    pub venue: Option<VenueRow>,
    pub show_interest: Option<String>,
    pub performance_interest: Option<String>,
    pub sold_out: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sharer {
    pub user_id: i64,
    pub email: Option<String>,
}

pub struct Planner<'a, R: ?Sized, G: ?Sized> {
    rows: &'a R,
    graph: &'a G,
    tz: Tz,
    now: DateTime<Utc>,
}

impl<'a, R, G> Planner<'a, R, G>
where
    R: RowSource + ?Sized,
    G: SocialGraph + ?Sized,
{
    pub fn new(rows: &'a R, graph: &'a G, tz: Tz) -> Self {
        Self {
            rows,
            graph,
            tz,
            now: Utc::now(),
        }
    }

    /// Pins the instant the past-event filter compares against.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn compute_day_layout(
        &self,
        user_id: i64,
        date: NaiveDate,
        filter: &Filter,
        boost: ShareBoost,
        include_shared: bool,
    ) -> Result<DayLayout> {
        let depth = if include_shared { social::SHARE_DEPTH } else { 0 };
        let events = self.load_day_events(user_id, None, date, filter, depth)?;
        let layout = layout::pack_columns(events, boost);
        log::debug!(
            "user {user_id} {date}: {} columns over {} hours from {:02}:00",
            layout.columns.len(),
            layout.hour_count,
            layout.first_hour
        );
        Ok(layout)
    }

    /// Events the user can see on `date`, conflicts against bookings removed
    /// and the filter applied. `depth` bounds how many levels of sharers are
    /// loaded to score social interest.
    pub fn load_day_events(
        &self,
        user_id: i64,
        email: Option<&str>,
        date: NaiveDate,
        filter: &Filter,
        depth: u8,
    ) -> Result<Vec<Event>> {
        let window = DayWindow::for_date(date, self.tz)?;

        let shared = if depth > 0 {
            social::aggregate(self.graph, user_id, |sharer| {
                self.load_day_events(
                    sharer.user_id,
                    sharer.email.as_deref(),
                    date,
                    &Filter::show_all(),
                    depth - 1,
                )
            })?
        } else {
            SharedInterests::default()
        };

        let rows = self.rows.performance_rows(user_id)?;
        let total_rows = rows.len();
        let mut day_rows = window::select_day_rows(rows, &window, self.tz);
        let within = std::mem::take(&mut day_rows.within);

        let owner = Owner {
            user_id,
            email: email.map(str::to_string),
        };
        let mut events = Vec::with_capacity(within.len());
        for row in within {
            if builder::sold_out_unbooked(&row) {
                continue;
            }
            let last_chance = day_rows.is_last_chance(row.show_id);
            events.push(builder::build_event(row, &owner, last_chance, &shared, self.tz)?);
        }
        let candidates = events.len();

        let events = conflicts::resolve_conflicts(events);
        let events: Vec<Event> = events
            .into_iter()
            .filter(|event| filter.show(event, self.now))
            .collect();

        log::debug!(
            "user {user_id} {date}: {total_rows} rows, {candidates} on the day, {} shown",
            events.len()
        );
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlannerError;
    use crate::models::{Interest, StyleTag};
    use crate::planner::fixtures::{row, Catalogue};
    use chrono::TimeZone;
    use chrono_tz::Europe::London;

    fn aug(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 8, d).expect("valid date")
    }

    fn festival_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 8, 1, 0, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn layout_for(
        catalogue: &Catalogue,
        user_id: i64,
        date: NaiveDate,
        filter: &Filter,
        boost: ShareBoost,
    ) -> DayLayout {
        Planner::new(catalogue, catalogue, London)
            .at(festival_morning())
            .compute_day_layout(user_id, date, filter, boost, true)
            .expect("layout")
    }

    fn laid_out_ids(layout: &DayLayout) -> Vec<i64> {
        let mut ids: Vec<i64> = layout
            .columns
            .iter()
            .flat_map(|c| c.events().map(|e| e.performance_id))
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn booked_performance_suppresses_overlapping_like() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![
                row(1, 10, "Ticketed", "Theatre", "2019-08-10 14:00", 60)
                    .performance_interest("Booked")
                    .show_interest("Booked"),
                row(2, 20, "Clashing", "Theatre", "2019-08-10 14:50", 60).show_interest("Like"),
            ],
        );

        let layout = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::None);
        assert_eq!(laid_out_ids(&layout), vec![10]);
        assert_eq!(layout.columns.len(), 1);
        assert_eq!(layout.columns[0].header, "Booked");
    }

    #[test]
    fn lone_must_is_last_chance() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![row(1, 10, "Only Once", "Music", "2019-08-10 20:00", 60).show_interest("Must")],
        );

        let layout = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::None);
        let event = layout.columns[0].events().next().expect("event");
        assert!(event.last_chance);
        assert_eq!(scoring::importance(event, ShareBoost::None), 10_000);
        assert_eq!(event.style(), StyleTag::LastChance);
        assert_eq!(layout.columns[0].importance, 10_000);
    }

    #[test]
    fn hidden_category_keeps_booked_comedy() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![
                row(1, 10, "Booked Laughs", "Comedy", "2019-08-10 12:00", 60)
                    .performance_interest("Booked")
                    .show_interest("Booked"),
                row(2, 20, "Maybe Laughs", "Comedy", "2019-08-10 15:00", 60).show_interest("Like"),
                row(2, 21, "Maybe Laughs", "Comedy", "2019-08-11 15:00", 60).show_interest("Like"),
                row(3, 30, "Last Laughs", "Comedy", "2019-08-10 18:00", 60).show_interest("Like"),
                row(4, 40, "A Play", "Theatre", "2019-08-10 15:00", 60).show_interest("Like"),
                row(4, 41, "A Play", "Theatre", "2019-08-11 15:00", 60).show_interest("Like"),
            ],
        );

        let filter = Filter::from_hidden(["Comedy"]);
        let layout = layout_for(&catalogue, 1, aug(10), &filter, ShareBoost::None);
        assert_eq!(laid_out_ids(&layout), vec![10, 30, 40]);

        let booked = layout
            .columns
            .iter()
            .find(|c| c.header == "Booked")
            .expect("booked column");
        let booked_ids: Vec<i64> = booked.events().map(|e| e.performance_id).collect();
        assert_eq!(booked_ids, vec![10]);
    }

    #[test]
    fn sharer_must_boosts_liked_performance() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![
                row(1, 10, "Shared Show", "Dance", "2019-08-10 16:00", 60).show_interest("Like"),
                row(1, 11, "Shared Show", "Dance", "2019-08-12 16:00", 60).show_interest("Like"),
            ],
        );
        catalogue.add_rows(
            2,
            vec![
                row(1, 10, "Shared Show", "Dance", "2019-08-10 16:00", 60).show_interest("Must"),
                row(1, 11, "Shared Show", "Dance", "2019-08-12 16:00", 60).show_interest("Must"),
            ],
        );
        catalogue.add_share(1, 2, Some("friend@example.com"));

        let layout = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::Lot);
        let event = layout.columns[0].events().next().expect("event");
        assert_eq!(event.shared_interests.len(), 1);
        assert_eq!(event.max_shared_interest(), Some(Interest::Must));
        assert_eq!(scoring::importance(event, ShareBoost::Lot), 1_700);
        assert_eq!(layout.columns[0].importance, 1_700);

        let solo = Planner::new(&catalogue, &catalogue, London)
            .at(festival_morning())
            .compute_day_layout(1, aug(10), &Filter::show_all(), ShareBoost::Lot, false)
            .expect("layout");
        assert_eq!(solo.columns[0].importance, 100);
    }

    #[test]
    fn past_and_bounds_hide_repeat_performances() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![
                row(1, 10, "Morning Repeat", "Music", "2019-08-10 10:00", 60).show_interest("Like"),
                row(1, 11, "Morning Repeat", "Music", "2019-08-11 10:00", 60).show_interest("Like"),
                row(2, 20, "Late Repeat", "Music", "2019-08-10 20:00", 60).show_interest("Must"),
                row(2, 21, "Late Repeat", "Music", "2019-08-11 20:00", 60).show_interest("Must"),
                row(3, 30, "Ticket", "Music", "2019-08-10 12:00", 60)
                    .performance_interest("Booked")
                    .show_interest("Booked"),
                row(4, 40, "Final Morning", "Music", "2019-08-10 09:00", 60).show_interest("Like"),
                row(5, 50, "Afternoon", "Music", "2019-08-10 15:00", 60).show_interest("Like"),
                row(5, 51, "Afternoon", "Music", "2019-08-11 15:00", 60).show_interest("Like"),
            ],
        );

        let mut filter = Filter::show_all();
        filter.show_past = false;
        filter.end_at = Some(fixtures::local("2019-08-10 19:00").with_timezone(&Utc));
        let now = fixtures::local("2019-08-10 11:00").with_timezone(&Utc);

        let events = Planner::new(&catalogue, &catalogue, London)
            .at(now)
            .load_day_events(1, None, aug(10), &filter, 0)
            .expect("events");
        let mut ids: Vec<i64> = events.iter().map(|e| e.performance_id).collect();
        ids.sort();
        assert_eq!(ids, vec![30, 40, 50]);
    }

    #[test]
    fn shares_of_shares_are_not_expanded() {
        let mut catalogue = Catalogue::default();
        for user in [1, 2, 3] {
            catalogue.add_rows(
                user,
                vec![row(1, 10, "Chain", "Music", "2019-08-10 16:00", 60).show_interest("Must")],
            );
        }
        catalogue.add_share(1, 2, Some("two@example.com"));
        catalogue.add_share(2, 3, Some("three@example.com"));

        let planner = Planner::new(&catalogue, &catalogue, London).at(festival_morning());
        let events = planner
            .load_day_events(1, None, aug(10), &Filter::show_all(), social::SHARE_DEPTH)
            .expect("events");
        let shared = &events[0].shared_interests;
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].user_id, 2);
        assert!(shared[0].shared_interests.is_empty());
    }

    #[test]
    fn unknown_sharer_is_skipped() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![row(1, 10, "Solo", "Music", "2019-08-10 16:00", 60).show_interest("Like")],
        );
        catalogue.add_share(1, 99, None);

        let layout = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::Lot);
        assert_eq!(laid_out_ids(&layout), vec![10]);
    }

    #[test]
    fn unknown_user_is_an_error() {
        let catalogue = Catalogue::default();
        let result = Planner::new(&catalogue, &catalogue, London)
            .compute_day_layout(7, aug(10), &Filter::show_all(), ShareBoost::None, true);
        assert!(matches!(result, Err(PlannerError::UnresolvedReference(_))));
    }

    #[test]
    fn missing_venue_is_an_error() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![row(1, 10, "Nowhere", "Music", "2019-08-10 16:00", 60).without_venue()],
        );
        let result = Planner::new(&catalogue, &catalogue, London)
            .compute_day_layout(1, aug(10), &Filter::show_all(), ShareBoost::None, false);
        assert!(matches!(result, Err(PlannerError::UnresolvedReference(_))));
    }

    #[test]
    fn sold_out_only_hides_unbooked() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![
                row(1, 10, "Hot Ticket", "Music", "2019-08-10 12:00", 60)
                    .performance_interest("Booked")
                    .sold_out(),
                row(2, 20, "Too Late", "Music", "2019-08-10 16:00", 60)
                    .show_interest("Must")
                    .sold_out(),
            ],
        );
        let layout = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::None);
        assert_eq!(laid_out_ids(&layout), vec![10]);
    }

    #[test]
    fn empty_day_has_default_window() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(1, Vec::new());
        let layout = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::None);
        assert!(layout.columns.is_empty());
        assert_eq!(layout.first_hour, window::DAY_START_HOUR);
        assert_eq!(layout.hour_count, 0);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let mut catalogue = Catalogue::default();
        catalogue.add_rows(
            1,
            vec![
                row(1, 10, "Alpha", "Music", "2019-08-10 12:00", 60).show_interest("Like"),
                row(2, 20, "Beta", "Music", "2019-08-10 12:30", 45).show_interest("Must"),
                row(3, 30, "Gamma", "Theatre", "2019-08-10 13:00", 90),
                row(4, 40, "Delta", "Theatre", "2019-08-10 19:15", 50)
                    .performance_interest("Booked"),
            ],
        );
        catalogue.add_share(1, 1, Some("self@example.com"));

        let first = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::Bit);
        let second = layout_for(&catalogue, 1, aug(10), &Filter::show_all(), ShareBoost::Bit);
        assert_eq!(
            first.digest().expect("digest"),
            second.digest().expect("digest")
        );
        assert_eq!(
            serde_json::to_string(&first).expect("json"),
            serde_json::to_string(&second).expect("json")
        );
    }
}
