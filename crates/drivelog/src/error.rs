//! Error types for drivelog.
//!
//! This module defines the infrastructure errors used throughout the crate.
//! User-facing form rejections live next to the code that produces them
//! ([`crate::intake::IntakeError`], [`crate::drivers::DriverError`]) so that
//! their `Display` text can be shown verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for drivelog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// The session database could not be opened or created.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Database file.
        path: PathBuf,
        /// Cause reported by SQLite.
        #[source]
        source: rusqlite::Error,
    },

    /// A statement or transaction failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The schema could not be brought to the current version.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// What went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// A configuration source could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// The offending key and why.
        message: String,
    },

    // === Credential Errors ===
    /// Hashing a driver password failed.
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    // === Server Errors ===
    /// The HTTP server could not bind or serve.
    #[error("server error: {0}")]
    Server(String),

    // === I/O Errors ===
    /// Reading a file or socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The database directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that was being created.
        path: PathBuf,
        /// Cause reported by the OS.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// Rendering JSON output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// A broken invariant, such as a poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for drivelog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new server error.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
