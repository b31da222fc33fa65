//! Driving-session intake.
//!
//! Turns one submitted form into either a stored session or a single
//! user-facing rejection. Checks run in a fixed order and stop at the first
//! failure:
//!
//! 1. required fields are present (a zero mileage counts as missing),
//! 2. every reference token decodes for its category,
//! 3. date, times and mileage parse and the end time is after the start,
//! 4. every decoded id exists (checked by storage, in the insert transaction),
//! 5. the row is inserted.
//!
//! Token failures collapse into one generic message so a client cannot learn
//! which field it tampered with. Unknown references are named, since the ids
//! behind them came from validly signed tokens.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::category::Category;
use crate::session::{NewSession, DATE_FORMAT};
use crate::storage::{RecordOutcome, Storage};
use crate::token::TokenCodec;

/// Message shown after a successful intake.
pub const SUCCESS_MESSAGE: &str = "Driving experience recorded successfully!";

/// Accepted time-of-day formats, tried in order.
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S"];

/// One submitted session form. Field names match the HTML form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionForm {
    /// Session date, `YYYY-MM-DD`.
    pub date: String,
    /// Start time, `HH:MM` or `HH:MM:SS`.
    pub start_time: String,
    /// End time, `HH:MM` or `HH:MM:SS`.
    pub end_time: String,
    /// Distance as a decimal string.
    pub mileage: String,
    /// Driver token.
    pub driver_id: String,
    /// Weather token.
    pub weather_id: String,
    /// Traffic token.
    pub traffic_id: String,
    /// Road type token.
    pub road_type_id: String,
    /// Visibility token.
    pub visibility_id: String,
    /// Maneuver token.
    pub maneuver_id: String,
}

impl SessionForm {
    /// The submitted token for `category`.
    #[must_use]
    pub fn token(&self, category: Category) -> &str {
        match category {
            Category::Driver => &self.driver_id,
            Category::Weather => &self.weather_id,
            Category::Traffic => &self.traffic_id,
            Category::RoadType => &self.road_type_id,
            Category::Visibility => &self.visibility_id,
            Category::Maneuver => &self.maneuver_id,
        }
    }
}

/// Why a submission was rejected. `Display` is the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    /// A required field was empty.
    #[error("All fields are required!")]
    MissingField(&'static str),

    /// A date or time field could not be parsed.
    #[error("Invalid {0} format!")]
    MalformedField(&'static str),

    /// Mileage is not a finite, non-negative number.
    #[error("Mileage must be a non-negative number!")]
    InvalidMileage,

    /// At least one reference token failed to decode.
    #[error("Invalid form data detected. Please try again.")]
    InvalidToken,

    /// The end time is not after the start time.
    #[error("End time must be after start time!")]
    InvalidTimeRange,

    /// A decoded id has no row in its reference table.
    #[error("Invalid {} selected!", .0.label())]
    UnknownReference(Category),

    /// The store refused the insert. Details are logged, not shown.
    #[error("Error recording driving experience. Please try again.")]
    PersistenceFailure,
}

/// Severity of a [`Flash`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    /// The operation succeeded.
    Success,
    /// The operation was rejected or failed.
    Error,
}

/// A one-time message for the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    /// Severity.
    pub level: FlashLevel,
    /// Text to display.
    pub message: String,
}

impl Flash {
    /// A success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    /// An error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    /// Whether this reports success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.level == FlashLevel::Success
    }
}

impl From<&Result<i64, IntakeError>> for Flash {
    fn from(result: &Result<i64, IntakeError>) -> Self {
        match result {
            Ok(_) => Self::success(SUCCESS_MESSAGE),
            Err(err) => Self::error(err.to_string()),
        }
    }
}

/// Validate `form` and store it as a new session.
///
/// Returns the id of the inserted session. Exactly one row is written on
/// success and none on any failure.
///
/// # Errors
///
/// Returns the first [`IntakeError`] encountered, in the order described in
/// the module documentation.
pub fn submit(
    storage: &mut Storage,
    codec: &TokenCodec,
    form: &SessionForm,
) -> Result<i64, IntakeError> {
    let session = validate(codec, form)?;

    match storage.record_session(&session) {
        Ok(RecordOutcome::Recorded(id)) => {
            info!("Session {} recorded for driver {}", id, session.driver_id);
            Ok(id)
        }
        Ok(RecordOutcome::UnknownReference(category)) => {
            warn!("Session rejected: unknown {} reference", category);
            Err(IntakeError::UnknownReference(category))
        }
        Err(e) => {
            error!("Failed to record session: {}", e);
            Err(IntakeError::PersistenceFailure)
        }
    }
}

/// Run every check that does not need the database.
///
/// # Errors
///
/// Returns the first failing check.
pub fn validate(codec: &TokenCodec, form: &SessionForm) -> Result<NewSession, IntakeError> {
    let date = required("date", &form.date)?;
    let start = required("start time", &form.start_time)?;
    let end = required("end time", &form.end_time)?;
    let mileage = required("mileage", &form.mileage)?;
    if mileage.parse::<f64>().is_ok_and(|m| m == 0.0) {
        return Err(IntakeError::MissingField("mileage"));
    }

    let mut ids = [0_i64; 6];
    let mut tampered = false;
    for (slot, category) in ids.iter_mut().zip(Category::ALL) {
        // All six are decoded even after a failure.
        match codec.decode(form.token(category).trim(), category) {
            Ok(id) => *slot = id,
            Err(_) => tampered = true,
        }
    }
    if tampered {
        warn!("Session rejected: invalid reference token");
        return Err(IntakeError::InvalidToken);
    }
    let [driver_id, weather_id, traffic_id, road_type_id, visibility_id, maneuver_id] = ids;

    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| IntakeError::MalformedField("date"))?;
    let start_time = parse_time(start).ok_or(IntakeError::MalformedField("start time"))?;
    let end_time = parse_time(end).ok_or(IntakeError::MalformedField("end time"))?;
    let mileage = mileage
        .parse::<f64>()
        .ok()
        .filter(|m| m.is_finite() && *m >= 0.0)
        .ok_or(IntakeError::InvalidMileage)?;

    if end_time <= start_time {
        return Err(IntakeError::InvalidTimeRange);
    }

    Ok(NewSession {
        date,
        start_time,
        end_time,
        mileage,
        driver_id,
        weather_id,
        traffic_id,
        road_type_id,
        visibility_id,
        maneuver_id,
    })
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, IntakeError> {
    let value = value.trim();
    if value.is_empty() {
        Err(IntakeError::MissingField(field))
    } else {
        Ok(value)
    }
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        storage: Storage,
        codec: TokenCodec,
        driver_id: i64,
    }

    fn fixture() -> Fixture {
        crate::logging::init_test_logging();
        let storage = Storage::open_in_memory().unwrap();
        let driver_id = storage
            .insert_driver("Ada", "$2b$04$notarealhash", "1990-01-01")
            .unwrap();
        Fixture {
            storage,
            codec: TokenCodec::new("intake-test-secret"),
            driver_id,
        }
    }

    impl Fixture {
        fn valid_form(&self) -> SessionForm {
            let token = |id, category| self.codec.encode(id, category);
            SessionForm {
                date: "2024-05-01".to_string(),
                start_time: "09:00".to_string(),
                end_time: "10:15".to_string(),
                mileage: "23.4".to_string(),
                driver_id: token(self.driver_id, Category::Driver),
                weather_id: token(2, Category::Weather),
                traffic_id: token(1, Category::Traffic),
                road_type_id: token(3, Category::RoadType),
                visibility_id: token(1, Category::Visibility),
                maneuver_id: token(4, Category::Maneuver),
            }
        }

        fn submit(&mut self, form: &SessionForm) -> Result<i64, IntakeError> {
            submit(&mut self.storage, &self.codec, form)
        }
    }

    /// Flip the first character of the MAC prefix.
    fn tamper(token: &str) -> String {
        let replacement = if token.starts_with('0') { "1" } else { "0" };
        format!("{replacement}{}", &token[1..])
    }

    #[test]
    fn test_valid_submission_on_empty_table() {
        let mut fx = fixture();
        let form = fx.valid_form();

        let result = fx.submit(&form);
        assert_eq!(result, Ok(101));
        assert_eq!(fx.storage.session_count().unwrap(), 1);

        let flash = Flash::from(&result);
        assert!(flash.is_success());
        assert_eq!(flash.message, SUCCESS_MESSAGE);

        let stored = &fx.storage.sessions().unwrap()[0];
        assert_eq!(stored.weather, "Cloudy");
        assert_eq!(stored.road_type, "Highway");
        assert_eq!(stored.maneuver, "Highway merge");
        assert!((stored.mileage - 23.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_valid_submission_follows_max_id() {
        let mut fx = fixture();
        let form = fx.valid_form();
        let before_max = fx.submit(&form).unwrap();

        let mut form = fx.valid_form();
        form.date = "2024-05-02".to_string();
        assert_eq!(fx.submit(&form), Ok(before_max + 1));
        assert_eq!(fx.storage.session_count().unwrap(), 2);
    }

    #[test]
    fn test_missing_fields() {
        let mut fx = fixture();
        for field in ["date", "start_time", "end_time", "mileage"] {
            let mut form = fx.valid_form();
            match field {
                "date" => form.date = "  ".to_string(),
                "start_time" => form.start_time.clear(),
                "end_time" => form.end_time.clear(),
                _ => form.mileage.clear(),
            }
            let err = fx.submit(&form).unwrap_err();
            assert!(matches!(err, IntakeError::MissingField(_)), "{field}");
            assert_eq!(err.to_string(), "All fields are required!");
        }
        assert_eq!(fx.storage.session_count().unwrap(), 0);
    }

    #[test]
    fn test_zero_mileage_counts_as_missing() {
        let mut fx = fixture();
        for zero in ["0", "0.0", "0.00"] {
            let mut form = fx.valid_form();
            form.mileage = zero.to_string();
            assert_eq!(
                fx.submit(&form),
                Err(IntakeError::MissingField("mileage"))
            );
        }
    }

    #[test]
    fn test_presence_checked_before_tokens() {
        let mut fx = fixture();
        let mut form = fx.valid_form();
        form.date.clear();
        form.weather_id = "garbage".to_string();
        assert_eq!(fx.submit(&form), Err(IntakeError::MissingField("date")));
    }

    #[test]
    fn test_any_bad_token_gives_generic_message() {
        let mut fx = fixture();
        for category in Category::ALL {
            let mut form = fx.valid_form();
            let bad = tamper(&fx.codec.encode(1, category));
            match category {
                Category::Driver => form.driver_id = bad,
                Category::Weather => form.weather_id = bad,
                Category::Traffic => form.traffic_id = bad,
                Category::RoadType => form.road_type_id = bad,
                Category::Visibility => form.visibility_id = bad,
                Category::Maneuver => form.maneuver_id = bad,
            }
            let err = fx.submit(&form).unwrap_err();
            assert_eq!(err, IntakeError::InvalidToken);
            assert_eq!(
                err.to_string(),
                "Invalid form data detected. Please try again."
            );
            assert!(!err.to_string().contains(category.label()));
        }
        assert_eq!(fx.storage.session_count().unwrap(), 0);
    }

    #[test]
    fn test_swapped_category_token_rejected() {
        let mut fx = fixture();
        let mut form = fx.valid_form();
        // A valid weather token presented as the traffic selection.
        form.traffic_id = fx.codec.encode(1, Category::Weather);
        assert_eq!(fx.submit(&form), Err(IntakeError::InvalidToken));
    }

    #[test]
    fn test_raw_integer_ids_rejected() {
        let mut fx = fixture();
        let mut form = fx.valid_form();
        form.weather_id = "2".to_string();
        assert_eq!(fx.submit(&form), Err(IntakeError::InvalidToken));
    }

    #[test]
    fn test_end_not_after_start_rejected() {
        let mut fx = fixture();
        for (start, end) in [("10:00", "10:00"), ("10:00", "09:59"), ("23:30", "00:15")] {
            let mut form = fx.valid_form();
            form.start_time = start.to_string();
            form.end_time = end.to_string();
            let err = fx.submit(&form).unwrap_err();
            assert_eq!(err, IntakeError::InvalidTimeRange, "{start}-{end}");
            assert_eq!(err.to_string(), "End time must be after start time!");
        }
        assert_eq!(fx.storage.session_count().unwrap(), 0);
    }

    #[test]
    fn test_time_with_seconds_accepted() {
        let mut fx = fixture();
        let mut form = fx.valid_form();
        form.start_time = "09:00:30".to_string();
        form.end_time = "09:00:31".to_string();
        assert!(fx.submit(&form).is_ok());
    }

    #[test]
    fn test_malformed_date_and_times() {
        let mut fx = fixture();

        let mut form = fx.valid_form();
        form.date = "01/05/2024".to_string();
        assert_eq!(fx.submit(&form), Err(IntakeError::MalformedField("date")));

        let mut form = fx.valid_form();
        form.start_time = "nine".to_string();
        let err = fx.submit(&form).unwrap_err();
        assert_eq!(err, IntakeError::MalformedField("start time"));
        assert_eq!(err.to_string(), "Invalid start time format!");

        let mut form = fx.valid_form();
        form.end_time = "25:00".to_string();
        assert_eq!(
            fx.submit(&form),
            Err(IntakeError::MalformedField("end time"))
        );
    }

    #[test]
    fn test_invalid_mileage() {
        let mut fx = fixture();
        for bad in ["-3", "abc", "NaN", "inf"] {
            let mut form = fx.valid_form();
            form.mileage = bad.to_string();
            assert_eq!(fx.submit(&form), Err(IntakeError::InvalidMileage), "{bad}");
        }
    }

    #[test]
    fn test_unknown_reference_names_category() {
        let mut fx = fixture();
        let mut form = fx.valid_form();
        form.weather_id = fx.codec.encode(999, Category::Weather);

        let err = fx.submit(&form).unwrap_err();
        assert_eq!(err, IntakeError::UnknownReference(Category::Weather));
        assert_eq!(err.to_string(), "Invalid weather selected!");
        assert_eq!(fx.storage.session_count().unwrap(), 0);

        let mut form = fx.valid_form();
        form.road_type_id = fx.codec.encode(999, Category::RoadType);
        let err = fx.submit(&form).unwrap_err();
        assert_eq!(err.to_string(), "Invalid road type selected!");
    }

    #[test]
    fn test_unknown_driver() {
        let mut fx = fixture();
        let mut form = fx.valid_form();
        form.driver_id = fx.codec.encode(fx.driver_id + 10, Category::Driver);
        assert_eq!(
            fx.submit(&form),
            Err(IntakeError::UnknownReference(Category::Driver))
        );
    }

    #[test]
    fn test_error_flash() {
        let result: Result<i64, IntakeError> = Err(IntakeError::InvalidTimeRange);
        let flash = Flash::from(&result);
        assert_eq!(flash.level, FlashLevel::Error);
        assert_eq!(flash.message, "End time must be after start time!");
    }

    #[test]
    fn test_persistence_failure_message_is_generic() {
        let err = IntakeError::PersistenceFailure;
        let msg = err.to_string();
        assert!(!msg.to_lowercase().contains("sql"));
        assert!(!msg.contains("constraint"));
    }

    #[test]
    fn test_flash_serializes_level_snake_case() {
        let json = serde_json::to_string(&Flash::success("ok")).unwrap();
        assert_eq!(json, r#"{"level":"success","message":"ok"}"#);
    }

    #[test]
    fn test_form_deserializes_with_missing_fields() {
        let form: SessionForm = serde_json::from_str(r#"{"date":"2024-05-01"}"#).unwrap();
        assert_eq!(form.date, "2024-05-01");
        assert!(form.mileage.is_empty());
    }
}
