use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Event, Interest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub show_like: bool,
    pub show_must: bool,
    pub show_booked: bool,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub show_past: bool,
    pub hidden_categories: BTreeSet<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Self::show_all()
    }
}

impl Filter {
    pub fn show_all() -> Self {
        Self {
            show_like: true,
            show_must: true,
            show_booked: true,
            start_at: None,
            end_at: None,
            show_past: true,
            hidden_categories: BTreeSet::new(),
        }
    }

    /// `like`, `love` and `booked` switch off an interest tier; any other
    /// token hides the category of that name.
    pub fn from_hidden<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::show_all();
        for token in tokens {
            match token.as_ref().trim() {
                "" => {}
                "like" => filter.show_like = false,
                "love" => filter.show_must = false,
                "booked" => filter.show_booked = false,
                category => {
                    filter.hidden_categories.insert(category.to_string());
                }
            }
        }
        filter
    }

    /// Booked and last-chance events are always shown.
    pub fn show(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if event.booked() || event.last_chance {
            return true;
        }
        let tier_enabled = match event.interest() {
            Some(Interest::Like) => self.show_like,
            Some(Interest::Must) => self.show_must,
            Some(Interest::Booked) => self.show_booked,
            _ => true,
        };
        if !tier_enabled || self.hidden_categories.contains(&event.category) {
            return false;
        }
        let start = event.start_utc();
        if self.start_at.is_some_and(|bound| start < bound) {
            return false;
        }
        if self.end_at.is_some_and(|bound| start > bound) {
            return false;
        }
        self.show_past || start > now
    }
}
