//! Interval store contracts and implementations.
//!
//! # Responsibility
//! - Persist the full interval list in listing order.
//! - Map rows to `IntervalEntity` with strict decoding.
//!
//! # Invariants
//! - `save_all` replaces the stored list atomically.
//! - `load_all` returns intervals ordered by `sort_order`.
//! - Timestamps are stored as wall-clock epoch milliseconds.

use crate::db::DbError;
use crate::model::frequency::{FrequencyRule, FrequencyUnit};
use crate::model::interval::{IntervalEntity, IntervalStatus, IntervalValidationError};
use chrono::{DateTime, NaiveDateTime};
use log::{debug, error};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const INTERVAL_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    start_date,
    include_time,
    last_completed,
    next_due,
    frequency_unit,
    frequency_count,
    status,
    became_overdue_at
FROM intervals
ORDER BY sort_order ASC, uuid ASC;";

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence error for interval storage.
#[derive(Debug)]
pub enum RepoError {
    Validation(IntervalValidationError),
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted interval data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<IntervalValidationError> for RepoError {
    fn from(value: IntervalValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persistence collaborator consumed by the registry.
pub trait IntervalStore: Send {
    fn load_all(&self) -> RepoResult<Vec<IntervalEntity>>;
    fn save_all(&mut self, intervals: &[IntervalEntity]) -> RepoResult<()>;
}

/// SQLite-backed interval store owning its connection.
pub struct SqliteIntervalStore {
    conn: Connection,
}

impl SqliteIntervalStore {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl IntervalStore for SqliteIntervalStore {
    fn load_all(&self) -> RepoResult<Vec<IntervalEntity>> {
        let mut stmt = self.conn.prepare(INTERVAL_SELECT_SQL)?;
        let mut rows = stmt.query([])?;
        let mut intervals = Vec::new();
        while let Some(row) = rows.next()? {
            intervals.push(parse_interval_row(row)?);
        }
        debug!(
            "event=intervals_load module=repo status=ok count={}",
            intervals.len()
        );
        Ok(intervals)
    }

    fn save_all(&mut self, intervals: &[IntervalEntity]) -> RepoResult<()> {
        for interval in intervals {
            interval.validate()?;
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM intervals;", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO intervals (
                    uuid,
                    name,
                    start_date,
                    include_time,
                    last_completed,
                    next_due,
                    frequency_unit,
                    frequency_count,
                    status,
                    became_overdue_at,
                    sort_order
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            )?;
            for (index, interval) in intervals.iter().enumerate() {
                insert.execute(params![
                    interval.id.to_string(),
                    interval.name.as_str(),
                    to_epoch_ms(interval.start_date),
                    bool_to_int(interval.include_time),
                    interval.last_completed.map(to_epoch_ms),
                    to_epoch_ms(interval.next_due),
                    unit_to_db(interval.frequency.unit()),
                    i64::from(interval.frequency.count()),
                    interval.status.as_str(),
                    interval.became_overdue_at.map(to_epoch_ms),
                    i64::try_from(index).unwrap_or(i64::MAX),
                ])?;
            }
        }
        tx.commit()?;
        debug!(
            "event=intervals_save module=repo status=ok count={}",
            intervals.len()
        );
        Ok(())
    }
}

/// Volatile store used when no database is configured.
#[derive(Debug, Default, Clone)]
pub struct MemoryIntervalStore {
    intervals: Vec<IntervalEntity>,
}

impl MemoryIntervalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing intervals.
    pub fn with_intervals(intervals: Vec<IntervalEntity>) -> Self {
        Self { intervals }
    }
}

impl IntervalStore for MemoryIntervalStore {
    fn load_all(&self) -> RepoResult<Vec<IntervalEntity>> {
        Ok(self.intervals.clone())
    }

    fn save_all(&mut self, intervals: &[IntervalEntity]) -> RepoResult<()> {
        for interval in intervals {
            interval.validate()?;
        }
        self.intervals = intervals.to_vec();
        Ok(())
    }
}

fn parse_interval_row(row: &Row<'_>) -> RepoResult<IntervalEntity> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid `{uuid_text}` in intervals.uuid"))
    })?;

    let unit_text: String = row.get("frequency_unit")?;
    let unit = parse_unit(&unit_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid frequency unit `{unit_text}` in intervals.frequency_unit"
        ))
    })?;
    let count: i64 = row.get("frequency_count")?;
    let frequency = u32::try_from(count)
        .ok()
        .and_then(|count| FrequencyRule::new(unit, count).ok())
        .ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid frequency count `{count}` in intervals.frequency_count"
            ))
        })?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in intervals.status"))
    })?;

    let include_time = match row.get::<_, i64>("include_time")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid include_time value `{other}` in intervals.include_time"
            )));
        }
    };

    let interval = IntervalEntity {
        id,
        name: row.get("name")?,
        start_date: from_epoch_ms(row.get("start_date")?, "start_date")?,
        include_time,
        last_completed: row
            .get::<_, Option<i64>>("last_completed")?
            .map(|value| from_epoch_ms(value, "last_completed"))
            .transpose()?,
        next_due: from_epoch_ms(row.get("next_due")?, "next_due")?,
        frequency,
        status,
        became_overdue_at: row
            .get::<_, Option<i64>>("became_overdue_at")?
            .map(|value| from_epoch_ms(value, "became_overdue_at"))
            .transpose()?,
    };
    if let Err(err) = interval.validate() {
        error!("event=intervals_load module=repo status=error id={id} error={err}");
        return Err(err.into());
    }
    Ok(interval)
}

fn to_epoch_ms(value: NaiveDateTime) -> i64 {
    value.and_utc().timestamp_millis()
}

fn from_epoch_ms(value: i64, column: &str) -> RepoResult<NaiveDateTime> {
    DateTime::from_timestamp_millis(value)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            RepoError::InvalidData(format!("invalid timestamp `{value}` in intervals.{column}"))
        })
}

fn unit_to_db(unit: FrequencyUnit) -> &'static str {
    match unit {
        FrequencyUnit::Days => "days",
        FrequencyUnit::Weeks => "weeks",
        FrequencyUnit::Months => "months",
    }
}

fn parse_unit(value: &str) -> Option<FrequencyUnit> {
    match value {
        "days" => Some(FrequencyUnit::Days),
        "weeks" => Some(FrequencyUnit::Weeks),
        "months" => Some(FrequencyUnit::Months),
        _ => None,
    }
}

fn parse_status(value: &str) -> Option<IntervalStatus> {
    match value {
        "normal" => Some(IntervalStatus::Normal),
        "overdue" => Some(IntervalStatus::Overdue),
        "completing" => Some(IntervalStatus::Completing),
        _ => None,
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{IntervalStore, MemoryIntervalStore, RepoError};
    use crate::model::frequency::FrequencyRule;
    use crate::model::interval::{IntervalEntity, IntervalValidationError, NewInterval};
    use chrono::NaiveDate;

    fn weekly(name: &str) -> IntervalEntity {
        let now = NaiveDate::from_ymd_opt(2024, 4, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        IntervalEntity::create(
            NewInterval {
                name: name.to_string(),
                start_date: now,
                frequency: FrequencyRule::weeks(1).unwrap(),
                include_time: true,
            },
            now,
        )
        .0
    }

    #[test]
    fn seeded_memory_store_keeps_contents_on_rejected_save() {
        let seeded = vec![weekly("laundry"), weekly("vacuum")];
        let mut store = MemoryIntervalStore::with_intervals(seeded.clone());
        assert_eq!(store.load_all().unwrap(), seeded);

        let err = store
            .save_all(&[weekly("mop"), weekly("")])
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(IntervalValidationError::EmptyName)
        ));
        assert_eq!(store.load_all().unwrap(), seeded);
    }
}
