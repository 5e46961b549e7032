use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const TITLE_LIMIT: usize = 50;
const MAPS_SEARCH_URL: &str = "https://www.google.co.uk/maps/search/";

static POINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)?$")
        .expect("valid point regex")
});

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Venue {
    pub name: String,
    pub map_link: String,
}

impl Venue {
    /// Builds a venue whose map link searches for the stored coordinates,
    /// falling back to the venue name when none are known.
    pub fn new(name: &str, latlong: Option<&str>) -> Self {
        let query = match latlong.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => match POINT_RE.captures(raw) {
                Some(caps) => format!("{},{}", &caps[1], &caps[2]),
                None => raw.to_string(),
            },
            None => name.split_whitespace().collect::<Vec<_>>().join("+"),
        };
        Self {
            name: name.to_string(),
            map_link: format!("{MAPS_SEARCH_URL}{query}"),
        }
    }
}

/// Interest tier a user attached to a show or a single performance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Interest {
    Booked,
    Must,
    Like,
    Other(String),
}

impl Interest {
    /// Empty strings carry no tier.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" => None,
            "Booked" => Some(Interest::Booked),
            "Must" => Some(Interest::Must),
            "Like" => Some(Interest::Like),
            other => Some(Interest::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Interest::Booked => "Booked",
            Interest::Must => "Must",
            Interest::Like => "Like",
            Interest::Other(raw) => raw,
        }
    }

    /// Display ranking of a sharer's interest. Free-text tiers rank below
    /// Like; Booked without a booking ranks with no tier at all.
    pub fn rank(&self) -> u8 {
        match self {
            Interest::Must => 3,
            Interest::Like => 2,
            Interest::Other(_) => 1,
            Interest::Booked => 0,
        }
    }
}

/// Booked > Must > Like, looking at both tiers; otherwise the raw
/// performance-level value wins over the show-level one.
pub fn effective_interest(
    performance: Option<&Interest>,
    show: Option<&Interest>,
) -> Option<Interest> {
    let either = |tier: &Interest| performance == Some(tier) || show == Some(tier);
    if either(&Interest::Booked) {
        Some(Interest::Booked)
    } else if either(&Interest::Must) {
        Some(Interest::Must)
    } else if either(&Interest::Like) {
        Some(Interest::Like)
    } else {
        performance.or(show).cloned()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleTag {
    #[serde(rename = "booked")]
    Booked,
    #[serde(rename = "lastchance")]
    LastChance,
    #[serde(rename = "important0")]
    Must,
    #[serde(rename = "important1")]
    Like,
    #[serde(rename = "important2")]
    Other,
}

#[derive(Serialize, Clone, Debug)]
#[serde(into = "EventView")]
pub struct Event {
    pub show_id: i64,
    pub performance_id: i64,
    pub user_id: i64,
    pub user_email: Option<String>,
    pub title: String,
    pub category: String,
    pub venue: Venue,
    pub booking_url: String,
    pub start: DateTime<Tz>,
    pub duration: Duration,
    pub show_interest: Option<Interest>,
    pub performance_interest: Option<Interest>,
    pub last_chance: bool,
    pub shared_interests: Vec<Arc<Event>>,
}

impl Event {
    pub fn end(&self) -> DateTime<Tz> {
        self.start + self.duration
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn title_maybe_truncated(&self) -> String {
        if self.title.chars().count() > TITLE_LIMIT {
            let mut cut: String = self.title.chars().take(TITLE_LIMIT - 1).collect();
            cut.push('…');
            cut
        } else {
            self.title.clone()
        }
    }

    pub fn booked(&self) -> bool {
        self.performance_interest == Some(Interest::Booked)
    }

    pub fn interest(&self) -> Option<Interest> {
        effective_interest(
            self.performance_interest.as_ref(),
            self.show_interest.as_ref(),
        )
    }

    pub fn style(&self) -> StyleTag {
        if self.booked() {
            return StyleTag::Booked;
        }
        match self.interest() {
            Some(Interest::Must) if self.last_chance => StyleTag::LastChance,
            Some(Interest::Must) => StyleTag::Must,
            Some(Interest::Like) => StyleTag::Like,
            _ => StyleTag::Other,
        }
    }

    /// Half-open overlap: each starts before the other ends.
    pub fn intersects(&self, other: &Event) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Strongest interest any sharer expressed in this performance.
    pub fn max_shared_interest(&self) -> Option<Interest> {
        if self.shared_interests.iter().any(|shared| shared.booked()) {
            return Some(Interest::Booked);
        }
        self.shared_interests
            .iter()
            .filter_map(|shared| shared.interest())
            .filter(|interest| interest.rank() > 0)
            .max_by_key(Interest::rank)
    }
}

/// Flat shape handed to renderers.
#[derive(Serialize, Debug)]
pub struct EventView {
    pub show_id: i64,
    pub performance_id: i64,
    pub title: String,
    pub title_truncated: String,
    pub category: String,
    pub venue: Venue,
    pub booking_url: String,
    pub style: StyleTag,
    pub start_local: String,
    pub duration_minutes: i64,
    pub booked: bool,
    pub last_chance: bool,
    pub interest: Option<String>,
    pub max_shared_interest: Option<String>,
    pub shared_with: Vec<String>,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        let shared_with = event
            .shared_interests
            .iter()
            .filter_map(|shared| shared.user_email.clone())
            .collect();
        EventView {
            show_id: event.show_id,
            performance_id: event.performance_id,
            title_truncated: event.title_maybe_truncated(),
            style: event.style(),
            start_local: event.start.to_rfc3339(),
            duration_minutes: event.duration.num_minutes(),
            booked: event.booked(),
            last_chance: event.last_chance,
            interest: event.interest().map(|i| i.as_str().to_string()),
            max_shared_interest: event.max_shared_interest().map(|i| i.as_str().to_string()),
            shared_with,
            title: event.title,
            category: event.category,
            venue: event.venue,
            booking_url: event.booking_url,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventOrPadding {
    Event { event: Event, minutes: i64 },
    Padding { minutes: i64 },
}

impl EventOrPadding {
    pub fn event(event: Event) -> Self {
        let minutes = event.duration.num_minutes();
        EventOrPadding::Event { event, minutes }
    }

    pub fn padding(gap: Duration) -> Self {
        EventOrPadding::Padding {
            minutes: gap.num_minutes(),
        }
    }

    pub fn minutes(&self) -> i64 {
        match self {
            EventOrPadding::Event { minutes, .. } | EventOrPadding::Padding { minutes } => *minutes,
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            EventOrPadding::Event { event, .. } => Some(event),
            EventOrPadding::Padding { .. } => None,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct Column {
    pub header: String,
    pub importance: i64,
    pub entries: Vec<EventOrPadding>,
}

impl Column {
    pub fn span_minutes(&self) -> i64 {
        self.entries.iter().map(EventOrPadding::minutes).sum()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().filter_map(EventOrPadding::as_event)
    }
}
