//! Attendance ledger.
//!
//! This module provides `SQLite`-based append-only storage of check-ins and
//! enforces at most one check-in per attendee name per local calendar date.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::roster::normalize_name;

/// Text format of stored timestamps (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text format of calendar dates as produced by `SQLite`'s `date()`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One check-in event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    /// Row id assigned by the ledger.
    pub id: i64,
    /// The registered attendee this check-in belongs to, if linked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendee_id: Option<i64>,
    /// Attendee name as checked in.
    pub name: String,
    /// Local wall-clock time of the check-in.
    pub checked_in_at: NaiveDateTime,
}

impl AttendanceRecord {
    /// Local calendar date of the check-in.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.checked_in_at.date()
    }
}

/// Append-only store of check-ins.
#[derive(Debug)]
pub struct Ledger {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Source of "now" and "today".
    clock: Box<dyn Clock>,
}

impl Ledger {
    /// Open or create a ledger database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening ledger at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Every check-in must be on disk before the operator sees "registered"
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Ledger opened at {}", path.display());
        Ok(Self {
            path,
            conn,
            clock: Box::new(SystemClock),
        })
    }

    /// Create an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
            clock: Box::new(SystemClock),
        })
    }

    /// Replace the clock used to stamp and date check-ins.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Swap the clock in place.
    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        self.clock = Box::new(clock);
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Today's date according to the ledger's clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Check whether `name` already has a check-in dated today.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn has_checked_in_today(&self, name: &str) -> Result<bool> {
        self.has_checked_in_on(name, self.clock.today())
    }

    /// Check whether `name` has a check-in on the given date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn has_checked_in_on(&self, name: &str, date: NaiveDate) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE name = ?1 AND date(checked_in_at) = ?2",
            params![name, date.format(DATE_FORMAT).to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a check-in for `name` stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateCheckIn`] if `name` is already checked in
    /// today, a validation error for blank names, or a storage error.
    pub fn check_in(&self, name: &str) -> Result<AttendanceRecord> {
        self.check_in_with_code(name, None)
    }

    /// Record a check-in, remembering the QR payload that identified the attendee.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::check_in`].
    pub fn check_in_with_code(&self, name: &str, qr_code: Option<&str>) -> Result<AttendanceRecord> {
        let name = normalize_name(name)?;
        let now = self.clock.now();
        let today = now.date();

        if self.has_checked_in_on(name, today)? {
            debug!(name, %today, "Rejecting second check-in for the day");
            return Err(Error::DuplicateCheckIn {
                name: name.to_string(),
                date: today,
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        let attendee_id = Self::ensure_attendee(&tx, name, qr_code, now)?;
        let inserted = tx.execute(
            "INSERT INTO attendance (attendee_id, name, checked_in_at) VALUES (?1, ?2, ?3)",
            params![attendee_id, name, now.format(TIMESTAMP_FORMAT).to_string()],
        );

        match inserted {
            Ok(_) => {}
            // The daily unique index caught a check-in that raced the lookup above
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(Error::DuplicateCheckIn {
                    name: name.to_string(),
                    date: today,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(id, name, at = %now, "Checked in");
        Ok(AttendanceRecord {
            id,
            attendee_id: Some(attendee_id),
            name: name.to_string(),
            checked_in_at: now,
        })
    }

    /// Find the registered attendee for `name`, creating one if needed.
    fn ensure_attendee(
        conn: &Connection,
        name: &str,
        qr_code: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<i64> {
        let existing: Option<(i64, Option<String>)> = conn
            .query_row(
                "SELECT id, qr_code FROM attendees WHERE name = ?1 ORDER BY id LIMIT 1",
                [name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        // A payload already bound to another attendee is not stored twice
        let qr_code = match qr_code {
            Some(code) if Self::code_in_use(conn, code)? => None,
            other => other,
        };

        if let Some((id, stored_code)) = existing {
            if stored_code.is_none() {
                if let Some(code) = qr_code {
                    conn.execute(
                        "UPDATE attendees SET qr_code = ?1 WHERE id = ?2",
                        params![code, id],
                    )?;
                }
            }
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO attendees (name, qr_code, registered_at) VALUES (?1, ?2, ?3)",
            params![name, qr_code, now.format(TIMESTAMP_FORMAT).to_string()],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, name, "Registered attendee");
        Ok(id)
    }

    fn code_in_use(conn: &Connection, code: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM attendees WHERE qr_code = ?1",
            [code],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All check-ins, newest first.
    ///
    /// Each call re-reads the database. `limit` caps the number of rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, attendee_id, name, checked_in_at
            FROM attendance ORDER BY checked_in_at DESC, id DESC LIMIT ?1
            ",
        )?;

        // A negative LIMIT means no limit in SQLite
        let limit_i64 = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let records = stmt
            .query_map([limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Check-ins on a given local date, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn history_on(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, attendee_id, name, checked_in_at
            FROM attendance WHERE date(checked_in_at) = ?1
            ORDER BY checked_in_at DESC, id DESC
            ",
        )?;

        let records = stmt
            .query_map(
                [date.format(DATE_FORMAT).to_string()],
                Self::row_to_record,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Count all check-ins.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count check-ins on a given local date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_on(&self, date: NaiveDate) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM attendance WHERE date(checked_in_at) = ?1",
            [date.format(DATE_FORMAT).to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Convert a database row to an [`AttendanceRecord`].
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<AttendanceRecord> {
        let checked_in_at: String = row.get(3)?;
        let checked_in_at = NaiveDateTime::parse_from_str(&checked_in_at, TIMESTAMP_FORMAT)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(AttendanceRecord {
            id: row.get(0)?,
            attendee_id: row.get(1)?,
            name: row.get(2)?,
            checked_in_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn ledger_at(time: NaiveDateTime) -> Ledger {
        Ledger::open_in_memory()
            .expect("failed to create test ledger")
            .with_clock(FixedClock(time))
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Ledger::open_in_memory().is_ok());
    }

    #[test]
    fn test_check_in_records_current_time() {
        let ledger = ledger_at(at(20, 18, 30));

        let record = ledger.check_in("Alice").unwrap();
        assert_eq!(record.name, "Alice");
        assert_eq!(record.checked_in_at, at(20, 18, 30));
        assert!(record.attendee_id.is_some());
        assert!(ledger.has_checked_in_today("Alice").unwrap());
        assert!(!ledger.has_checked_in_today("Bob").unwrap());
    }

    #[test]
    fn test_second_check_in_same_day_rejected() {
        let mut ledger = ledger_at(at(20, 18, 0));
        ledger.check_in("Alice").unwrap();

        ledger.set_clock(FixedClock(at(20, 23, 59)));
        let err = ledger.check_in("Alice").unwrap_err();
        assert!(err.is_duplicate_check_in());
        assert_eq!(ledger.count_on(ledger.today()).unwrap(), 1);
    }

    #[test]
    fn test_check_in_again_next_day() {
        let mut ledger = ledger_at(at(20, 23, 59));
        ledger.check_in("Alice").unwrap();

        ledger.set_clock(FixedClock(at(21, 0, 1)));
        assert!(!ledger.has_checked_in_today("Alice").unwrap());
        ledger.check_in("Alice").unwrap();
        assert_eq!(ledger.count().unwrap(), 2);
    }

    #[test]
    fn test_check_in_blank_name_rejected() {
        let ledger = ledger_at(at(20, 18, 0));
        let err = ledger.check_in("  ").unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(ledger.count().unwrap(), 0);
    }

    #[test]
    fn test_check_in_is_case_sensitive() {
        let ledger = ledger_at(at(20, 18, 0));
        ledger.check_in("Alice").unwrap();
        ledger.check_in("alice").unwrap();
        assert_eq!(ledger.count().unwrap(), 2);
    }

    #[test]
    fn test_check_ins_reuse_attendee_row() {
        let mut ledger = ledger_at(at(20, 18, 0));
        let first = ledger.check_in("Alice").unwrap();
        ledger.set_clock(FixedClock(at(21, 18, 0)));
        let second = ledger.check_in("Alice").unwrap();
        assert_eq!(first.attendee_id, second.attendee_id);
    }

    #[test]
    fn test_check_in_with_code_stores_payload() {
        let ledger = ledger_at(at(20, 18, 0));
        ledger.check_in_with_code("Alice", Some("Alice")).unwrap();

        let code: Option<String> = ledger
            .conn
            .query_row("SELECT qr_code FROM attendees WHERE name = 'Alice'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(code.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_rows_from_other_writers_count_as_checked_in() {
        let ledger = ledger_at(at(20, 18, 0));
        ledger
            .conn
            .execute(
                "INSERT INTO attendance (name, checked_in_at) VALUES ('Alice', '2024-12-20 08:00:00')",
                [],
            )
            .unwrap();

        let err = ledger.check_in("Alice").unwrap_err();
        assert!(err.is_duplicate_check_in());
    }

    #[test]
    fn test_history_newest_first() {
        let mut ledger = ledger_at(at(20, 18, 0));
        ledger.check_in("Alice").unwrap();
        ledger.set_clock(FixedClock(at(20, 19, 0)));
        ledger.check_in("Bob").unwrap();
        ledger.set_clock(FixedClock(at(21, 9, 0)));
        ledger.check_in("Alice").unwrap();

        let history = ledger.history(None).unwrap();
        let names: Vec<_> = history.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob", "Alice"]);
        assert_eq!(history[0].checked_in_at, at(21, 9, 0));

        let limited = ledger.history(Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_history_requeries_store() {
        let ledger = ledger_at(at(20, 18, 0));
        assert!(ledger.history(None).unwrap().is_empty());
        ledger.check_in("Alice").unwrap();
        assert_eq!(ledger.history(None).unwrap().len(), 1);
    }

    #[test]
    fn test_history_on_date() {
        let mut ledger = ledger_at(at(20, 18, 0));
        ledger.check_in("Alice").unwrap();
        ledger.set_clock(FixedClock(at(21, 9, 0)));
        ledger.check_in("Bob").unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        let records = ledger.history_on(day).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Bob");
        assert_eq!(records[0].date(), day);
        assert_eq!(ledger.count_on(day).unwrap(), 1);
    }

    #[test]
    fn test_open_file_backed_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("attendance.db");

        {
            let ledger = Ledger::open(&path).unwrap().with_clock(FixedClock(at(20, 18, 0)));
            ledger.check_in("Alice").unwrap();
        }

        let ledger = Ledger::open(&path).unwrap().with_clock(FixedClock(at(20, 20, 0)));
        assert_eq!(ledger.path(), path.as_path());
        assert!(ledger.has_checked_in_today("Alice").unwrap());
        assert!(ledger.check_in("Alice").unwrap_err().is_duplicate_check_in());
    }

    #[test]
    fn test_record_serializes_timestamp() {
        let ledger = ledger_at(at(20, 18, 30));
        let record = ledger.check_in("Alice").unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"name\":\"Alice\""));
        assert!(json.contains("2024-12-20T18:30:00"));
    }
}
