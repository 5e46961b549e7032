use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{PlannerError, Result};
use crate::models::Interest;
use crate::planner::{PerformanceRow, RowSource, Sharer, SocialGraph, VenueRow};
use crate::utils;

pub struct Store {
    conn: Connection,
}

pub struct NewShow<'a> {
    pub booking_url: &'a str,
    pub title: &'a str,
    pub category: &'a str,
    pub venue_id: i64,
    pub duration: Duration,
}

/// What a performance-level interest is cleared for.
#[derive(Clone, Copy, Debug)]
pub enum InterestTarget {
    Show(i64),
    Performance(i64),
}

const PERFORMANCE_ROWS_SQL: &str = "SELECT shows.id, shows.title, shows.category, shows.duration_minutes, shows.booking_url,
        performances.id, performances.datetime_utc, venues.name, venues.latlong,
        interests.interest, user_performance_interests.interest, sold_out.performance_id
     FROM shows
     INNER JOIN performances ON shows.id = performances.show_id
     LEFT JOIN venues ON shows.venue_id = venues.id
     INNER JOIN interests ON shows.id = interests.show_id
     INNER JOIN users ON users.id = interests.user_id
     LEFT JOIN (SELECT * FROM performance_interests WHERE user_id = ?1) user_performance_interests
       ON performances.id = user_performance_interests.performance_id
     LEFT JOIN sold_out ON sold_out.performance_id = performances.id
     WHERE users.id = ?1
       AND performances.datetime_utc > users.start_datetime_utc
       AND performances.datetime_utc < users.end_datetime_utc
     ORDER BY performances.datetime_utc ASC, shows.title ASC";

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        utils::ensure_parent(path);
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS venues(
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                latlong TEXT
            );
            CREATE TABLE IF NOT EXISTS shows(
                id INTEGER PRIMARY KEY,
                booking_url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                venue_id INTEGER,
                duration_minutes INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS performances(
                id INTEGER PRIMARY KEY,
                show_id INTEGER NOT NULL,
                datetime_utc INTEGER NOT NULL,
                UNIQUE(show_id, datetime_utc)
            );
            CREATE TABLE IF NOT EXISTS users(
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                start_datetime_utc INTEGER NOT NULL,
                end_datetime_utc INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS interests(
                show_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                interest TEXT NOT NULL,
                UNIQUE(show_id, user_id)
            );
            CREATE TABLE IF NOT EXISTS performance_interests(
                show_id INTEGER NOT NULL,
                performance_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                interest TEXT NOT NULL,
                UNIQUE(performance_id, user_id)
            );
            CREATE TABLE IF NOT EXISTS sold_out(
                performance_id INTEGER NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS shares(
                shared_by INTEGER NOT NULL,
                shared_with_email TEXT NOT NULL,
                UNIQUE(shared_by, shared_with_email)
            );",
        )?;
        Ok(())
    }

    pub fn upsert_venue(&self, name: &str, latlong: Option<&str>) -> Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM venues WHERE name = ?1 LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            self.conn.execute(
                "UPDATE venues SET latlong = ?2 WHERE id = ?1",
                params![id, latlong],
            )?;
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO venues (name, latlong) VALUES (?1, ?2)",
            params![name, latlong],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn lookup_venue_id(&self, name: &str) -> Result<i64> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM venues WHERE name = ?1 LIMIT 2")?;
        let ids = stmt
            .query_map(params![name], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        match ids.as_slice() {
            [id] => Ok(*id),
            [] => Err(PlannerError::UnresolvedReference(format!(
                "no venue named {name:?}"
            ))),
            _ => Err(PlannerError::UnresolvedReference(format!(
                "more than one venue named {name:?}"
            ))),
        }
    }

    /// Shows are keyed by their booking URL.
    pub fn upsert_show(&self, show: &NewShow<'_>) -> Result<i64> {
        let id = self.conn.query_row(
            "INSERT INTO shows (booking_url, title, category, venue_id, duration_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(booking_url) DO UPDATE SET
               title = excluded.title,
               category = excluded.category,
               venue_id = excluded.venue_id,
               duration_minutes = excluded.duration_minutes
             RETURNING id",
            params![
                show.booking_url,
                show.title,
                show.category,
                show.venue_id,
                show.duration.num_minutes()
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn insert_performance(&self, show_id: i64, start: DateTime<Utc>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO performances (show_id, datetime_utc) VALUES (?1, ?2)
             ON CONFLICT(show_id, datetime_utc) DO NOTHING",
            params![show_id, start.timestamp()],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM performances WHERE show_id = ?1 AND datetime_utc = ?2",
            params![show_id, start.timestamp()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn mark_sold_out(&self, performance_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sold_out (performance_id) VALUES (?1) ON CONFLICT DO NOTHING",
            params![performance_id],
        )?;
        Ok(())
    }

    pub fn create_user(
        &self,
        email: &str,
        visit_start: DateTime<Utc>,
        visit_end: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO users (email, start_datetime_utc, end_datetime_utc) VALUES (?1, ?2, ?3)",
            params![email, visit_start.timestamp(), visit_end.timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn user_window(&self, user_id: i64) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let window: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT start_datetime_utc, end_datetime_utc FROM users WHERE id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (start, end) =
            window.ok_or_else(|| PlannerError::UnresolvedReference(format!("user {user_id}")))?;
        Ok((from_timestamp(start)?, from_timestamp(end)?))
    }

    fn user_email(&self, user_id: i64) -> Result<String> {
        self.conn
            .query_row(
                "SELECT email FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| PlannerError::UnresolvedReference(format!("email of user {user_id}")))
    }

    /// Every local date the visit covers, the departure date excluded.
    pub fn visit_days(&self, user_id: i64, tz: Tz) -> Result<Vec<NaiveDate>> {
        let (start, end) = self.user_window(user_id)?;
        let first = start.with_timezone(&tz).date_naive();
        let last = end.with_timezone(&tz).date_naive();
        Ok(first.iter_days().take_while(|day| *day < last).collect())
    }

    fn show_for_performance(&self, performance_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT show_id FROM performances WHERE id = ?1",
                params![performance_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                PlannerError::UnresolvedReference(format!("performance {performance_id}"))
            })
    }

    pub fn set_interest(&self, user_id: i64, show_id: i64, interest: &Interest) -> Result<()> {
        self.conn.execute(
            "INSERT INTO interests (show_id, user_id, interest) VALUES (?1, ?2, ?3)
             ON CONFLICT(show_id, user_id) DO UPDATE SET interest = excluded.interest",
            params![show_id, user_id, interest.as_str()],
        )?;
        log::info!("user {user_id} marked show {show_id} as {}", interest.as_str());
        Ok(())
    }

    /// Forgets the show for the user, performance-level interests included.
    pub fn remove_interest(&self, user_id: i64, show_id: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM interests WHERE user_id = ?1 AND show_id = ?2",
            params![user_id, show_id],
        )?;
        self.unset_performance_interest(user_id, InterestTarget::Show(show_id))
    }

    pub fn set_performance_interest(
        &self,
        user_id: i64,
        performance_id: i64,
        interest: &Interest,
    ) -> Result<()> {
        let show_id = self.show_for_performance(performance_id)?;
        self.conn.execute(
            "INSERT INTO performance_interests (show_id, performance_id, user_id, interest)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(performance_id, user_id) DO UPDATE SET interest = excluded.interest",
            params![show_id, performance_id, user_id, interest.as_str()],
        )?;
        Ok(())
    }

    pub fn unset_performance_interest(&self, user_id: i64, target: InterestTarget) -> Result<()> {
        match target {
            InterestTarget::Show(show_id) => self.conn.execute(
                "DELETE FROM performance_interests WHERE user_id = ?1 AND show_id = ?2",
                params![user_id, show_id],
            )?,
            InterestTarget::Performance(performance_id) => self.conn.execute(
                "DELETE FROM performance_interests WHERE user_id = ?1 AND performance_id = ?2",
                params![user_id, performance_id],
            )?,
        };
        Ok(())
    }

    /// Books the performance and marks its show as booked.
    pub fn mark_booked(&self, user_id: i64, performance_id: i64) -> Result<()> {
        self.set_performance_interest(user_id, performance_id, &Interest::Booked)?;
        let show_id = self.show_for_performance(performance_id)?;
        self.set_interest(user_id, show_id, &Interest::Booked)
    }

    pub fn share(&self, shared_by: i64, shared_with_email: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO shares (shared_by, shared_with_email) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![shared_by, shared_with_email],
        )?;
        log::info!("user {shared_by} shared their schedule with {shared_with_email}");
        Ok(())
    }

    pub fn unshare(&self, shared_by: i64, shared_with_email: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM shares WHERE shared_by = ?1 AND shared_with_email = ?2",
            params![shared_by, shared_with_email],
        )?;
        Ok(())
    }

    /// Emails of users sharing with `user_id`, and emails `user_id` shares with.
    pub fn share_emails(&self, user_id: i64) -> Result<(Vec<String>, Vec<String>)> {
        let mut stmt = self.conn.prepare(
            "SELECT shared_with_email FROM shares WHERE shared_by = ?1 ORDER BY shared_with_email ASC",
        )?;
        let shared_with = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        let email = self.user_email(user_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT users.email FROM users INNER JOIN shares ON users.id = shares.shared_by
             WHERE shares.shared_with_email = ?1 ORDER BY users.email ASC",
        )?;
        let shared_by = stmt
            .query_map(params![email], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok((shared_by, shared_with))
    }
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| PlannerError::MalformedInput(format!("timestamp {secs} out of range")))
}

fn performance_row(row: &Row<'_>) -> rusqlite::Result<PerformanceRow> {
    let venue_name: Option<String> = row.get(7)?;
    let venue = match venue_name {
        Some(name) => Some(VenueRow {
            name,
            latlong: row.get(8)?,
        }),
        None => None,
    };
    let start: i64 = row.get(6)?;
    let start_utc = from_timestamp(start).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Integer, Box::new(err))
    })?;
    let minutes: i64 = row.get(3)?;
    let duration = Duration::try_minutes(minutes).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Integer,
            Box::new(PlannerError::MalformedInput(format!(
                "duration of {minutes} minutes out of range"
            ))),
        )
    })?;
    let sold_out: Option<i64> = row.get(11)?;
    Ok(PerformanceRow {
        show_id: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        duration,
        booking_url: row.get(4)?,
        performance_id: row.get(5)?,
        start_utc,
        venue,
        show_interest: row.get(9)?,
        performance_interest: row.get(10)?,
        sold_out: sold_out.is_some(),
    })
}

impl RowSource for Store {
    fn performance_rows(&self, user_id: i64) -> Result<Vec<PerformanceRow>> {
        self.user_window(user_id)?;
        let mut stmt = self.conn.prepare(PERFORMANCE_ROWS_SQL)?;
        let rows = stmt
            .query_map(params![user_id], performance_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl SocialGraph for Store {
    fn shared_by(&self, user_id: i64) -> Result<Vec<Sharer>> {
        let mut stmt = self.conn.prepare(
            "SELECT users.id, users.email FROM users
             INNER JOIN shares ON users.id = shares.shared_by
             WHERE shares.shared_with_email = (SELECT email FROM users WHERE id = ?1)
             ORDER BY users.email ASC",
        )?;
        let sharers = stmt
            .query_map(params![user_id], |row| {
                Ok(Sharer {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sharers)
    }
}
