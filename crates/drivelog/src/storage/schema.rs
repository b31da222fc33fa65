//! `SQLite` schema definitions for drivelog.
//!
//! This module contains the SQL statements for creating the session table,
//! the reference tables it points into, and the metadata table.

/// SQL statement to create the drivers table.
pub const CREATE_DRIVERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS drivers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    birthday TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create the weather conditions table.
pub const CREATE_WEATHER_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS weather_conditions (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL UNIQUE
)
";

/// SQL statement to create the traffic conditions table.
pub const CREATE_TRAFFIC_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS traffic_conditions (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL UNIQUE
)
";

/// SQL statement to create the road types table.
pub const CREATE_ROAD_TYPES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS road_types (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL UNIQUE
)
";

/// SQL statement to create the visibility ranges table.
pub const CREATE_VISIBILITY_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS visibility_ranges (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL UNIQUE
)
";

/// SQL statement to create the maneuvers table.
pub const CREATE_MANEUVERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS maneuvers (
    id INTEGER PRIMARY KEY,
    description TEXT NOT NULL UNIQUE
)
";

/// SQL statement to create the driving sessions table.
///
/// Times are stored as `HH:MM:SS`, so the text comparison in the check
/// constraint orders them correctly.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS driving_sessions (
    id INTEGER PRIMARY KEY,
    session_date TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    mileage REAL NOT NULL CHECK (mileage >= 0),
    driver_id INTEGER NOT NULL REFERENCES drivers(id),
    weather_id INTEGER NOT NULL REFERENCES weather_conditions(id),
    traffic_id INTEGER NOT NULL REFERENCES traffic_conditions(id),
    road_type_id INTEGER NOT NULL REFERENCES road_types(id),
    visibility_id INTEGER NOT NULL REFERENCES visibility_ranges(id),
    maneuver_id INTEGER NOT NULL REFERENCES maneuvers(id),
    CHECK (end_time > start_time)
)
";

/// SQL statement to create an index on `driver_id` for per-driver queries.
pub const CREATE_SESSIONS_DRIVER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sessions_driver ON driving_sessions(driver_id)
";

/// SQL statement to create an index on `session_date` for ordered listings.
pub const CREATE_SESSIONS_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sessions_date ON driving_sessions(session_date DESC, start_time DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_DRIVERS_TABLE,
    CREATE_WEATHER_TABLE,
    CREATE_TRAFFIC_TABLE,
    CREATE_ROAD_TYPES_TABLE,
    CREATE_VISIBILITY_TABLE,
    CREATE_MANEUVERS_TABLE,
    CREATE_SESSIONS_TABLE,
    CREATE_SESSIONS_DRIVER_INDEX,
    CREATE_SESSIONS_DATE_INDEX,
    CREATE_METADATA_TABLE,
];
