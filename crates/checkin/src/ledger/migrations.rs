//! Database migration system for the attendance ledger.
//!
//! This module handles schema versioning, bringing databases created by
//! earlier releases up to the current schema.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{CREATE_DAILY_UNIQUE_INDEX, SCHEMA_STATEMENTS};

/// The current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist, then runs any
/// pending migrations to bring the schema up to the current version.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = get_schema_version(conn)?;
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Run migrations from the given version to the current version.
fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
        info!(version = current, "Applied ledger migration");
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Run a specific migration version.
fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Migration to version 1 (initial schema, created by `SCHEMA_STATEMENTS`).
fn migrate_v1(conn: &Connection) -> Result<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration to version 2: enforce one check-in per name per day.
///
/// Ledgers that already hold several check-ins for one name on one day are
/// left at version 1 and the offending pairs are named in the error.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        r"
        SELECT name, date(checked_in_at), COUNT(*) FROM attendance
        GROUP BY name, date(checked_in_at)
        HAVING COUNT(*) > 1
        ORDER BY date(checked_in_at), name
        ",
    )?;
    let duplicates = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if !duplicates.is_empty() {
        let pairs: Vec<String> = duplicates
            .iter()
            .map(|(name, day, count)| {
                format!("{name} on {} ({count} rows)", day.as_deref().unwrap_or("unknown date"))
            })
            .collect();
        return Err(Error::DatabaseMigration {
            message: format!(
                "cannot enforce one check-in per name per day; duplicate check-ins: {}. \
                 Delete the extra rows from the attendance table and reopen",
                pairs.join(", ")
            ),
        });
    }

    conn.execute(CREATE_DAILY_UNIQUE_INDEX, [])?;
    set_schema_version(conn, 2)?;
    Ok(())
}
