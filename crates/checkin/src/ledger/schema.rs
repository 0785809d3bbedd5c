//! `SQLite` schema definitions for the attendance ledger.
//!
//! Timestamps are stored as local time text (`YYYY-MM-DD HH:MM:SS`), so
//! `date(checked_in_at)` is the local calendar date of a check-in.

/// SQL statement to create the registered attendees table.
pub const CREATE_ATTENDEES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS attendees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    qr_code TEXT UNIQUE,
    registered_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
";

/// SQL statement to create the attendance events table.
pub const CREATE_ATTENDANCE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS attendance (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attendee_id INTEGER,
    name TEXT NOT NULL,
    checked_in_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (attendee_id) REFERENCES attendees(id)
)
";

/// SQL statement to index check-ins by time for the history view.
pub const CREATE_CHECKED_IN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_attendance_checked_in_at ON attendance(checked_in_at DESC)
";

/// SQL statement to index attendees by name for lookups on check-in.
pub const CREATE_ATTENDEE_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_attendees_name ON attendees(name)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// One check-in per name per calendar date.
///
/// Applied by migration 2 because databases written before it may hold
/// duplicates that have to be reported rather than silently rejected.
pub const CREATE_DAILY_UNIQUE_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_name_day
    ON attendance(name, date(checked_in_at))
";

/// All base schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ATTENDEES_TABLE,
    CREATE_ATTENDANCE_TABLE,
    CREATE_CHECKED_IN_INDEX,
    CREATE_ATTENDEE_NAME_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_attendance_table_references_attendees() {
        assert!(CREATE_ATTENDANCE_TABLE.contains("attendee_id INTEGER"));
        assert!(CREATE_ATTENDANCE_TABLE.contains("name TEXT NOT NULL"));
        assert!(CREATE_ATTENDANCE_TABLE.contains("REFERENCES attendees(id)"));
    }

    #[test]
    fn test_attendees_qr_code_unique() {
        assert!(CREATE_ATTENDEES_TABLE.contains("qr_code TEXT UNIQUE"));
    }
}
