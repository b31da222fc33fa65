//! Schema versioning.
//!
//! The installed version lives in the `metadata` table under
//! `schema_version`. Steps only ever move forward.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::category::Category;
use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// The current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Default rows for the condition tables, inserted by migration 2.
pub const SEED_VALUES: &[(Category, &[&str])] = &[
    (Category::Weather, &["Clear", "Cloudy", "Rain", "Snow", "Fog"]),
    (Category::Traffic, &["Light", "Moderate", "Heavy"]),
    (Category::RoadType, &["Urban", "Rural", "Highway", "Mountain"]),
    (Category::Visibility, &["Good", "Reduced", "Poor"]),
    (
        Category::Maneuver,
        &["Parking", "Roundabout", "Overtaking", "Highway merge", "U-turn"],
    ),
];

/// A migration step: brings the schema from `version - 1` to `version`.
type Step = fn(&Connection) -> Result<()>;

/// Every migration, in order. The last entry's version is [`CURRENT_VERSION`].
const STEPS: &[(i32, Step)] = &[(1, base_schema), (2, seed_conditions)];

/// Create missing tables and bring the schema to [`CURRENT_VERSION`].
///
/// Each pending step runs in its own transaction together with the version
/// bump, so an interrupted upgrade resumes at the failed step.
///
/// # Errors
///
/// Returns an error if table creation or any step fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let installed = schema_version(conn)?;
    if installed > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {installed} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for &(version, step) in STEPS.iter().filter(|(v, _)| *v > installed) {
        debug!("Migrating schema to version {}", version);
        let tx = conn.unchecked_transaction()?;
        step(&tx)?;
        record_version(&tx, version)?;
        tx.commit()?;
    }

    Ok(())
}

/// The schema version stored in `metadata`, 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i32> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn record_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Version 1 is the table layout in `SCHEMA_STATEMENTS`; nothing to change.
fn base_schema(_conn: &Connection) -> Result<()> {
    Ok(())
}

/// Version 2: default rows for the condition tables.
fn seed_conditions(conn: &Connection) -> Result<()> {
    for (category, values) in SEED_VALUES {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (description) VALUES (?1)",
            category.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        for value in *values {
            stmt.execute([value])?;
        }
    }
    Ok(())
}
