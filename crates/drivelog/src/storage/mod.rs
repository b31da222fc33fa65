//! Storage layer for drivelog.
//!
//! This module provides `SQLite`-based persistent storage for drivers,
//! reference tables and driving sessions, including the transactional
//! session insert and cascading driver delete.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::Category;
use crate::error::{Error, Result};
use crate::session::{NewSession, SessionRecord, DATE_FORMAT, TIME_FORMAT};

/// Id given to the first session of an empty table; later ones count up from
/// the current maximum.
pub const FIRST_SESSION_ID: i64 = 101;

/// Metadata key holding the generated token secret.
const TOKEN_SECRET_KEY: &str = "token_secret";

/// Storage engine for driving sessions.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Reference lookups and existence checks
/// - Transactional session insertion
/// - Driver creation and cascading deletion
/// - Aggregates for the summary page
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

/// A row of a reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRow {
    /// Row id.
    pub id: i64,
    /// Description (the driver name for drivers).
    pub description: String,
}

/// A stored driver, without the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRow {
    /// Driver id.
    pub id: i64,
    /// Unique driver name.
    pub name: String,
    /// Birthday as stored (`YYYY-MM-DD`).
    pub birthday: String,
}

/// Per-driver aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStats {
    /// Driver id. Never serialized.
    #[serde(skip)]
    pub driver_id: i64,
    /// Driver name.
    pub name: String,
    /// Number of sessions.
    pub sessions: i64,
    /// Total distance.
    pub distance: f64,
    /// Mean distance per session, 0 without sessions.
    pub avg_distance: f64,
    /// Date of the first session.
    pub first_session: Option<String>,
    /// Date of the most recent session.
    pub last_session: Option<String>,
}

/// What happened to a session insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The session was stored under this id.
    Recorded(i64),
    /// A referenced row does not exist; nothing was written.
    UnknownReference(Category),
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
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

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
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
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The token secret kept in this database, generated on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn token_secret(&self) -> Result<String> {
        if let Some(secret) = self.stored_token_secret()? {
            return Ok(secret);
        }

        // Another process may store its secret first; the first write wins.
        self.conn.execute(
            "INSERT OR IGNORE INTO metadata (key, value) VALUES (?1, ?2)",
            (TOKEN_SECRET_KEY, crate::token::generate_secret()),
        )?;
        info!("Generated token secret in {}", self.path.display());

        self.stored_token_secret()?
            .ok_or_else(|| Error::internal("token secret missing after insert"))
    }

    fn stored_token_secret(&self) -> Result<Option<String>> {
        let secret = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [TOKEN_SECRET_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(secret)
    }

    // === Reference tables ===

    /// All rows of a reference table, ordered by id.
    ///
    /// For [`Category::Driver`] the description is the driver name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reference_rows(&self, category: Category) -> Result<Vec<ReferenceRow>> {
        let sql = format!(
            "SELECT id, {} FROM {} ORDER BY id",
            description_column(category),
            category.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ReferenceRow {
                    id: row.get(0)?,
                    description: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Check whether `id` exists in the table for `category`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reference_exists(&self, category: Category, id: i64) -> Result<bool> {
        reference_exists(&self.conn, category, id)
    }

    // === Sessions ===

    /// Insert a validated session.
    ///
    /// Every reference is checked and the row inserted inside one
    /// transaction. The new id is computed by the insert itself, as one more
    /// than the current maximum or [`FIRST_SESSION_ID`] for an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; the transaction is
    /// rolled back and nothing is written.
    pub fn record_session(&mut self, session: &NewSession) -> Result<RecordOutcome> {
        let tx = self.conn.transaction()?;

        for (category, id) in session.references() {
            if !reference_exists(&tx, category, id)? {
                debug!("Rejecting session: {} id {} does not exist", category, id);
                return Ok(RecordOutcome::UnknownReference(category));
            }
        }

        tx.execute(
            r"
            INSERT INTO driving_sessions (
                id, session_date, start_time, end_time, mileage,
                driver_id, weather_id, traffic_id, road_type_id, visibility_id, maneuver_id
            )
            VALUES (
                (SELECT COALESCE(MAX(id) + 1, ?1) FROM driving_sessions),
                ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
            )
            ",
            params![
                FIRST_SESSION_ID,
                session.date.format(DATE_FORMAT).to_string(),
                session.start_time.format(TIME_FORMAT).to_string(),
                session.end_time.format(TIME_FORMAT).to_string(),
                session.mileage,
                session.driver_id,
                session.weather_id,
                session.traffic_id,
                session.road_type_id,
                session.visibility_id,
                session.maneuver_id,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!("Recorded driving session {}", id);
        Ok(RecordOutcome::Recorded(id))
    }

    /// All sessions with their descriptions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT s.id, s.session_date, s.start_time, s.end_time, s.mileage,
                   d.name, w.description, t.description, r.description,
                   v.description, m.description
            FROM driving_sessions s
            JOIN drivers d ON s.driver_id = d.id
            JOIN weather_conditions w ON s.weather_id = w.id
            JOIN traffic_conditions t ON s.traffic_id = t.id
            JOIN road_types r ON s.road_type_id = r.id
            JOIN visibility_ranges v ON s.visibility_id = v.id
            JOIN maneuvers m ON s.maneuver_id = m.id
            ORDER BY s.session_date DESC, s.start_time DESC
            ",
        )?;

        let sessions = stmt
            .query_map([], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Count stored sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn session_count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM driving_sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Sum of all recorded mileage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn total_distance(&self) -> Result<f64> {
        let total: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(mileage), 0.0) FROM driving_sessions",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Number of sessions per description of a condition table, ordered by
    /// description. Descriptions without sessions are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn condition_counts(&self, category: Category) -> Result<Vec<(String, i64)>> {
        let sql = format!(
            r"
            SELECT c.{desc}, COUNT(*)
            FROM driving_sessions s
            JOIN {table} c ON s.{column} = c.id
            GROUP BY c.{desc}
            ORDER BY c.{desc}
            ",
            desc = description_column(category),
            table = category.table(),
            column = category.session_column(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    // === Drivers ===

    /// Check whether a driver with this exact name exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn driver_name_exists(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM drivers WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a driver with an already hashed password, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, including a
    /// duplicate name.
    pub fn insert_driver(&self, name: &str, password_hash: &str, birthday: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO drivers (name, password_hash, birthday) VALUES (?1, ?2, ?3)",
            params![name, password_hash, birthday],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted driver {} with id {}", name, id);
        Ok(id)
    }

    #[cfg(test)]
    pub(crate) fn driver_password_hash(&self, id: i64) -> Result<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT password_hash FROM drivers WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// All drivers, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn drivers(&self) -> Result<Vec<DriverRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, birthday FROM drivers ORDER BY id")?;
        let drivers = stmt
            .query_map([], |row| {
                Ok(DriverRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    birthday: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(drivers)
    }

    /// Delete a driver and every session they own.
    ///
    /// Both deletes run in one transaction: either the sessions and the
    /// driver are all gone, or nothing changed. Returns the number of sessions
    /// removed, or `None` if no such driver exists.
    ///
    /// # Errors
    ///
    /// Returns an error if either delete fails; the transaction is rolled back.
    pub fn delete_driver(&mut self, id: i64) -> Result<Option<usize>> {
        let tx = self.conn.transaction()?;

        if !reference_exists(&tx, Category::Driver, id)? {
            return Ok(None);
        }

        let sessions = tx.execute("DELETE FROM driving_sessions WHERE driver_id = ?1", [id])?;
        tx.execute("DELETE FROM drivers WHERE id = ?1", [id])?;
        tx.commit()?;

        info!("Deleted driver {} and {} sessions", id, sessions);
        Ok(Some(sessions))
    }

    /// Sessions, distance and date range per driver, ordered by driver id.
    /// Drivers without sessions are included with zero totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn driver_stats(&self) -> Result<Vec<DriverStats>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT d.id, d.name, COUNT(s.id), COALESCE(SUM(s.mileage), 0.0),
                   COALESCE(AVG(s.mileage), 0.0), MIN(s.session_date), MAX(s.session_date)
            FROM drivers d
            LEFT JOIN driving_sessions s ON s.driver_id = d.id
            GROUP BY d.id, d.name
            ORDER BY d.id
            ",
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(DriverStats {
                    driver_id: row.get(0)?,
                    name: row.get(1)?,
                    sessions: row.get(2)?,
                    distance: row.get(3)?,
                    avg_distance: row.get(4)?,
                    first_session: row.get(5)?,
                    last_session: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Convert a joined database row to a `SessionRecord`.
    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
        let date_str: String = row.get(1)?;
        let start_str: String = row.get(2)?;
        let end_str: String = row.get(3)?;

        Ok(SessionRecord {
            id: row.get(0)?,
            date: parse_column(1, &date_str, |s| NaiveDate::parse_from_str(s, DATE_FORMAT))?,
            start_time: parse_column(2, &start_str, |s| NaiveTime::parse_from_str(s, TIME_FORMAT))?,
            end_time: parse_column(3, &end_str, |s| NaiveTime::parse_from_str(s, TIME_FORMAT))?,
            mileage: row.get(4)?,
            driver: row.get(5)?,
            weather: row.get(6)?,
            traffic: row.get(7)?,
            road_type: row.get(8)?,
            visibility: row.get(9)?,
            maneuver: row.get(10)?,
        })
    }
}

/// Column holding the human-readable value of a reference table.
fn description_column(category: Category) -> &'static str {
    match category {
        Category::Driver => "name",
        _ => "description",
    }
}

/// Existence check usable on a plain connection or inside a transaction.
fn reference_exists(conn: &Connection, category: Category, id: i64) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?1", category.table());
    let count: i64 = conn.query_row(&sql, [id], |row| row.get(0))?;
    Ok(count > 0)
}

fn parse_column<T>(
    index: usize,
    value: &str,
    parse: impl FnOnce(&str) -> chrono::ParseResult<T>,
) -> rusqlite::Result<T> {
    parse(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}
