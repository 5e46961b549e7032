use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::models::{Event, Interest};

pub const BOOKED_SCORE: i64 = 99_999;

/// How much weight sharers' interest carries.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareBoost {
    #[default]
    None,
    Bit,
    Lot,
}

impl ShareBoost {
    pub fn base_bonus(self) -> i64 {
        match self {
            ShareBoost::None => 0,
            ShareBoost::Bit => 200,
            ShareBoost::Lot => 800,
        }
    }
}

impl FromStr for ShareBoost {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(ShareBoost::None),
            "bit" => Ok(ShareBoost::Bit),
            "lot" => Ok(ShareBoost::Lot),
            other => Err(PlannerError::MalformedInput(format!(
                "unknown share boost {other:?}"
            ))),
        }
    }
}

pub fn tier_score(interest: Option<&Interest>, last_chance: bool) -> i64 {
    match (interest, last_chance) {
        (Some(Interest::Must), true) => 10_000,
        (Some(Interest::Must), false) => 1_000,
        (Some(Interest::Like), true) => 200,
        (Some(Interest::Like), false) => 100,
        _ => 1,
    }
}

fn sharer_multiplier(shared: &Event) -> i64 {
    if shared.booked() {
        4
    } else if shared.interest() == Some(Interest::Must) {
        2
    } else {
        1
    }
}

pub fn social_bonus(event: &Event, boost: ShareBoost) -> i64 {
    let base = boost.base_bonus();
    event
        .shared_interests
        .iter()
        .map(|shared| base * sharer_multiplier(shared))
        .sum()
}

/// Ranking weight of an event. Only orders columns, never hides anything.
pub fn importance(event: &Event, boost: ShareBoost) -> i64 {
    if event.booked() {
        return BOOKED_SCORE;
    }
    let interest = event.interest();
    if interest == Some(Interest::Booked) {
        // Another performance of this show holds the booking.
        return 0;
    }
    tier_score(interest.as_ref(), event.last_chance) + social_bonus(event, boost)
}
