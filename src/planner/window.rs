use std::collections::HashSet;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use super::PerformanceRow;
use crate::error::{PlannerError, Result};

/// Local clock hour at which one festival day hands over to the next.
pub const DAY_START_HOUR: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    Within,
    After,
}

impl DayWindow {
    pub fn for_date(date: NaiveDate, tz: Tz) -> Result<Self> {
        let next = date
            .succ_opt()
            .ok_or_else(|| PlannerError::MalformedInput(format!("no day after {date}")))?;
        Ok(Self {
            start: local_cutover(date, tz)?,
            end: local_cutover(next, tz)?,
        })
    }

    /// Anything ending at or before the cutover belongs to the previous day;
    /// anything starting at or after the next cutover belongs to a later one.
    pub fn place(&self, start: DateTime<Tz>, duration: Duration) -> Placement {
        if start + duration <= self.start {
            Placement::Before
        } else if start >= self.end {
            Placement::After
        } else {
            Placement::Within
        }
    }
}

fn local_cutover(date: NaiveDate, tz: Tz) -> Result<DateTime<Tz>> {
    let naive = date
        .and_hms_opt(DAY_START_HOUR, 0, 0)
        .ok_or_else(|| PlannerError::MalformedInput(format!("invalid cutover on {date}")))?;
    resolve_local(&naive, tz)
}

/// Wall-clock time to an instant. Times skipped by a DST change are
/// rejected; repeated ones resolve to the earlier instant.
pub fn resolve_local(naive: &NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(PlannerError::MalformedInput(format!(
            "{naive} does not exist in {tz}"
        ))),
    }
}

pub struct DayRows {
    pub within: Vec<PerformanceRow>,
    pub later_shows: HashSet<i64>,
}

impl DayRows {
    pub fn is_last_chance(&self, show_id: i64) -> bool {
        !self.later_shows.contains(&show_id)
    }
}

/// Keeps the rows visible on the day and remembers every show that still
/// has a performance after it. Needs the complete row set for the user.
pub fn select_day_rows(rows: Vec<PerformanceRow>, window: &DayWindow, tz: Tz) -> DayRows {
    let mut within = Vec::new();
    let mut later_shows = HashSet::new();
    for row in rows {
        let start = row.start_utc.with_timezone(&tz);
        match window.place(start, row.duration) {
            Placement::Before => {}
            Placement::After => {
                later_shows.insert(row.show_id);
            }
            Placement::Within => within.push(row),
        }
    }
    DayRows {
        within,
        later_shows,
    }
}
