//! Aggregates for the summary page.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::Result;
use crate::session::SessionRecord;
use crate::storage::{DriverStats, Storage};

/// Sessions per description, ordered by description.
pub type ConditionCounts = BTreeMap<String, i64>;

/// Everything shown on the summary page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Sum of all mileage.
    pub total_distance: f64,
    /// Sessions per weather condition.
    pub weather: ConditionCounts,
    /// Sessions per traffic condition.
    pub traffic: ConditionCounts,
    /// Sessions per road type.
    pub road_type: ConditionCounts,
    /// Sessions per visibility range.
    pub visibility: ConditionCounts,
    /// Per-driver totals, drivers without sessions included.
    pub drivers: Vec<DriverStats>,
    /// Every session, newest first.
    pub sessions: Vec<SessionRecord>,
}

impl Summary {
    /// Compute the summary from the current store contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load(storage: &Storage) -> Result<Self> {
        let counts = |category: Category| -> Result<ConditionCounts> {
            Ok(storage.condition_counts(category)?.into_iter().collect())
        };

        Ok(Self {
            total_distance: storage.total_distance()?,
            weather: counts(Category::Weather)?,
            traffic: counts(Category::Traffic)?,
            road_type: counts(Category::RoadType)?,
            visibility: counts(Category::Visibility)?,
            drivers: storage.driver_stats()?,
            sessions: storage.sessions()?,
        })
    }

    /// Number of sessions covered.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
