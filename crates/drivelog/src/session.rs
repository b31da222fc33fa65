//! Core driving-session types.
//!
//! A [`NewSession`] is what intake hands to storage once every field has been
//! validated and every token decoded; a [`SessionRecord`] is what comes back
//! out, with the reference ids resolved to their descriptions.

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Storage format for session dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format for session times.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A validated session ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    /// Day the session took place.
    pub date: NaiveDate,
    /// Start of the session.
    pub start_time: NaiveTime,
    /// End of the session, strictly after `start_time`.
    pub end_time: NaiveTime,
    /// Distance driven.
    pub mileage: f64,
    /// Driver id.
    pub driver_id: i64,
    /// Weather condition id.
    pub weather_id: i64,
    /// Traffic condition id.
    pub traffic_id: i64,
    /// Road type id.
    pub road_type_id: i64,
    /// Visibility range id.
    pub visibility_id: i64,
    /// Maneuver id.
    pub maneuver_id: i64,
}

impl NewSession {
    /// The id referenced for `category`.
    #[must_use]
    pub fn reference(&self, category: Category) -> i64 {
        match category {
            Category::Driver => self.driver_id,
            Category::Weather => self.weather_id,
            Category::Traffic => self.traffic_id,
            Category::RoadType => self.road_type_id,
            Category::Visibility => self.visibility_id,
            Category::Maneuver => self.maneuver_id,
        }
    }

    /// Every (category, id) pair this session references.
    #[must_use]
    pub fn references(&self) -> [(Category, i64); 6] {
        Category::ALL.map(|category| (category, self.reference(category)))
    }
}

/// A stored session joined with its reference descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session id.
    pub id: i64,
    /// Day the session took place.
    pub date: NaiveDate,
    /// Start of the session.
    pub start_time: NaiveTime,
    /// End of the session.
    pub end_time: NaiveTime,
    /// Distance driven.
    pub mileage: f64,
    /// Driver name.
    pub driver: String,
    /// Weather description.
    pub weather: String,
    /// Traffic description.
    pub traffic: String,
    /// Road type description.
    pub road_type: String,
    /// Visibility description.
    pub visibility: String,
    /// Maneuver description.
    pub maneuver: String,
}

impl SessionRecord {
    /// How long the session lasted.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session() -> NewSession {
        NewSession {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            mileage: 42.5,
            driver_id: 1,
            weather_id: 2,
            traffic_id: 3,
            road_type_id: 4,
            visibility_id: 5,
            maneuver_id: 6,
        }
    }

    #[test]
    fn test_references_follow_category_order() {
        let session = new_session();
        let refs = session.references();
        assert_eq!(refs[0], (Category::Driver, 1));
        assert_eq!(refs[3], (Category::RoadType, 4));
        assert_eq!(refs[5], (Category::Maneuver, 6));
    }

    #[test]
    fn test_record_duration() {
        let session = new_session();
        let record = SessionRecord {
            id: 101,
            date: session.date,
            start_time: session.start_time,
            end_time: session.end_time,
            mileage: session.mileage,
            driver: "Ada".to_string(),
            weather: "Clear".to_string(),
            traffic: "Light".to_string(),
            road_type: "Urban".to_string(),
            visibility: "Good".to_string(),
            maneuver: "Parking".to_string(),
        };
        assert_eq!(record.duration(), Duration::minutes(90));
    }

    #[test]
    fn test_formats() {
        let session = new_session();
        assert_eq!(session.date.format(DATE_FORMAT).to_string(), "2024-05-01");
        assert_eq!(
            session.start_time.format(TIME_FORMAT).to_string(),
            "09:00:00"
        );
    }
}
