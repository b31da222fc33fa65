//! Driver management: creation, listing and deletion.
//!
//! Drivers are exposed to clients only through tokens. Deleting one removes
//! every session they own in the same transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::category::Category;
use crate::config::DriversConfig;
use crate::error::Result;
use crate::session::DATE_FORMAT;
use crate::storage::Storage;
use crate::token::TokenCodec;

/// Message shown after a driver is created.
pub const CREATED_MESSAGE: &str = "Driver added successfully!";

/// Message shown after a driver is deleted.
pub const DELETED_MESSAGE: &str = "Driver deleted successfully!";

/// The add-driver form. Field names match the HTML form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverForm {
    /// Unique display name.
    pub driver_name: String,
    /// Birthday, `YYYY-MM-DD`.
    pub birthday: String,
    /// Password in clear text.
    pub password: String,
    /// Password confirmation.
    pub confirm_password: String,
}

/// A driver as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverEntry {
    /// Driver token, usable for deletion and session intake.
    pub token: String,
    /// Driver name.
    pub name: String,
    /// Birthday as stored.
    pub birthday: String,
}

/// Why a driver operation was rejected. `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// A required field was empty.
    #[error("All fields are required!")]
    MissingField,

    /// Password and confirmation differ.
    #[error("Passwords do not match!")]
    PasswordMismatch,

    /// Password shorter than the configured minimum.
    #[error("Password must be at least {0} characters!")]
    PasswordTooShort(usize),

    /// Birthday is not a valid date.
    #[error("Invalid birthday format!")]
    InvalidBirthday,

    /// Another driver already uses this name.
    #[error("Driver name already exists!")]
    DuplicateName,

    /// The driver token did not decode.
    #[error("Invalid form data detected. Please try again.")]
    InvalidToken,

    /// No driver behind a valid token.
    #[error("Invalid driver selected!")]
    UnknownDriver,

    /// Storage or hashing failed. Details are logged, not shown.
    #[error("Error saving driver. Please try again.")]
    PersistenceFailure,
}

/// A validated driver with its password already hashed, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDriver {
    /// Trimmed name.
    pub name: String,
    /// Birthday, normalized to `YYYY-MM-DD`.
    pub birthday: String,
    /// bcrypt hash of the password.
    pub password_hash: String,
}

/// Validate `form` and hash its password. Touches no storage.
///
/// # Errors
///
/// Returns the first failing check, or [`DriverError::PersistenceFailure`]
/// if hashing fails.
pub fn prepare_driver(
    config: &DriversConfig,
    form: &DriverForm,
) -> std::result::Result<NewDriver, DriverError> {
    let name = form.driver_name.trim();
    let birthday = form.birthday.trim();
    if name.is_empty()
        || birthday.is_empty()
        || form.password.is_empty()
        || form.confirm_password.is_empty()
    {
        return Err(DriverError::MissingField);
    }
    if form.password != form.confirm_password {
        return Err(DriverError::PasswordMismatch);
    }
    if form.password.chars().count() < config.min_password_length {
        return Err(DriverError::PasswordTooShort(config.min_password_length));
    }
    let birthday = NaiveDate::parse_from_str(birthday, DATE_FORMAT)
        .map_err(|_| DriverError::InvalidBirthday)?
        .format(DATE_FORMAT)
        .to_string();

    let password_hash =
        bcrypt::hash(&form.password, config.bcrypt_cost).map_err(|e| persistence(e.into()))?;

    Ok(NewDriver {
        name: name.to_string(),
        birthday,
        password_hash,
    })
}

/// Store a prepared driver, returning its id.
///
/// # Errors
///
/// Returns [`DriverError::DuplicateName`] if the name is taken, or
/// [`DriverError::PersistenceFailure`] if the insert fails.
pub fn register_driver(
    storage: &Storage,
    driver: &NewDriver,
) -> std::result::Result<i64, DriverError> {
    if storage.driver_name_exists(&driver.name).map_err(persistence)? {
        return Err(DriverError::DuplicateName);
    }

    let id = storage
        .insert_driver(&driver.name, &driver.password_hash, &driver.birthday)
        .map_err(persistence)?;

    info!("Created driver {} with id {}", driver.name, id);
    Ok(id)
}

/// Validate `form`, hash the password and store the new driver.
///
/// Returns the new driver's id.
///
/// # Errors
///
/// See [`prepare_driver`] and [`register_driver`].
pub fn create_driver(
    storage: &Storage,
    config: &DriversConfig,
    form: &DriverForm,
) -> std::result::Result<i64, DriverError> {
    let driver = prepare_driver(config, form)?;
    register_driver(storage, &driver)
}

/// Every driver, ordered by id, with tokens in place of ids.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn list_drivers(storage: &Storage, codec: &TokenCodec) -> Result<Vec<DriverEntry>> {
    Ok(storage
        .drivers()?
        .into_iter()
        .map(|driver| DriverEntry {
            token: codec.encode(driver.id, Category::Driver),
            name: driver.name,
            birthday: driver.birthday,
        })
        .collect())
}

/// Delete the driver behind `token` along with all their sessions.
///
/// Returns the number of sessions removed.
///
/// # Errors
///
/// Returns [`DriverError::InvalidToken`] or [`DriverError::UnknownDriver`]
/// for bad input, [`DriverError::PersistenceFailure`] if the transaction
/// failed (nothing is deleted in that case).
pub fn delete_driver(
    storage: &mut Storage,
    codec: &TokenCodec,
    token: &str,
) -> std::result::Result<usize, DriverError> {
    let id = codec.decode(token.trim(), Category::Driver).map_err(|_| {
        warn!("Driver delete rejected: invalid token");
        DriverError::InvalidToken
    })?;

    match storage.delete_driver(id).map_err(persistence)? {
        Some(sessions) => Ok(sessions),
        None => Err(DriverError::UnknownDriver),
    }
}

fn persistence(err: crate::Error) -> DriverError {
    error!("Driver storage failure: {}", err);
    DriverError::PersistenceFailure
}
