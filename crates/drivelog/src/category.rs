//! Reference-table kinds.
//!
//! Every foreign key a driving session carries points into one of these
//! tables, and every form token is bound to exactly one of them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of reference row an identifier belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A registered driver.
    Driver,
    /// A weather condition.
    Weather,
    /// A traffic condition.
    Traffic,
    /// A road type.
    RoadType,
    /// A visibility range.
    Visibility,
    /// A maneuver practiced during the session.
    Maneuver,
}

impl Category {
    /// All categories, in the order session fields are validated.
    pub const ALL: [Category; 6] = [
        Self::Driver,
        Self::Weather,
        Self::Traffic,
        Self::RoadType,
        Self::Visibility,
        Self::Maneuver,
    ];

    /// The condition categories: everything except drivers.
    pub const CONDITIONS: [Category; 5] = [
        Self::Weather,
        Self::Traffic,
        Self::RoadType,
        Self::Visibility,
        Self::Maneuver,
    ];

    /// Tag embedded in tokens for this category.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Weather => "weather",
            Self::Traffic => "traffic",
            Self::RoadType => "roadtype",
            Self::Visibility => "visibility",
            Self::Maneuver => "maneuver",
        }
    }

    /// Human-readable name used in user messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Weather => "weather",
            Self::Traffic => "traffic",
            Self::RoadType => "road type",
            Self::Visibility => "visibility",
            Self::Maneuver => "maneuver",
        }
    }

    /// Name of the backing table.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Driver => "drivers",
            Self::Weather => "weather_conditions",
            Self::Traffic => "traffic_conditions",
            Self::RoadType => "road_types",
            Self::Visibility => "visibility_ranges",
            Self::Maneuver => "maneuvers",
        }
    }

    /// Column in `driving_sessions` that references this category.
    #[must_use]
    pub fn session_column(self) -> &'static str {
        match self {
            Self::Driver => "driver_id",
            Self::Weather => "weather_id",
            Self::Traffic => "traffic_id",
            Self::RoadType => "road_type_id",
            Self::Visibility => "visibility_id",
            Self::Maneuver => "maneuver_id",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts the token tag as well as the snake-case name (`road_type`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driver" => Ok(Self::Driver),
            "weather" => Ok(Self::Weather),
            "traffic" => Ok(Self::Traffic),
            "roadtype" | "road_type" | "road-type" => Ok(Self::RoadType),
            "visibility" => Ok(Self::Visibility),
            "maneuver" => Ok(Self::Maneuver),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}
