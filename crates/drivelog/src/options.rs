//! Choices offered by the session entry form.
//!
//! Every selectable row is handed out under its token, never its id.

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::Result;
use crate::storage::Storage;
use crate::token::TokenCodec;

/// One selectable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    /// Token to submit for this value.
    pub token: String,
    /// Text to display.
    pub description: String,
}

/// Everything the entry form needs to render its select boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormOptions {
    /// Drivers, labelled by name.
    pub drivers: Vec<OptionEntry>,
    /// Weather conditions.
    pub weather: Vec<OptionEntry>,
    /// Traffic conditions.
    pub traffic: Vec<OptionEntry>,
    /// Road types.
    pub road_types: Vec<OptionEntry>,
    /// Visibility ranges.
    pub visibility: Vec<OptionEntry>,
    /// Maneuvers.
    pub maneuvers: Vec<OptionEntry>,
    /// Distance recorded so far.
    pub total_distance: f64,
}

impl FormOptions {
    /// Load every reference table, ordered by id, with tokens minted by `codec`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn load(storage: &Storage, codec: &TokenCodec) -> Result<Self> {
        let entries = |category: Category| -> Result<Vec<OptionEntry>> {
            Ok(storage
                .reference_rows(category)?
                .into_iter()
                .map(|row| OptionEntry {
                    token: codec.encode(row.id, category),
                    description: row.description,
                })
                .collect())
        };

        Ok(Self {
            drivers: entries(Category::Driver)?,
            weather: entries(Category::Weather)?,
            traffic: entries(Category::Traffic)?,
            road_types: entries(Category::RoadType)?,
            visibility: entries(Category::Visibility)?,
            maneuvers: entries(Category::Maneuver)?,
            total_distance: storage.total_distance()?,
        })
    }

    /// The entries offered for `category`.
    #[must_use]
    pub fn entries(&self, category: Category) -> &[OptionEntry] {
        match category {
            Category::Driver => &self.drivers,
            Category::Weather => &self.weather,
            Category::Traffic => &self.traffic,
            Category::RoadType => &self.road_types,
            Category::Visibility => &self.visibility,
            Category::Maneuver => &self.maneuvers,
        }
    }

    /// Find the entry with this description.
    #[must_use]
    pub fn find(&self, category: Category, description: &str) -> Option<&OptionEntry> {
        self.entries(category)
            .iter()
            .find(|entry| entry.description == description)
    }
}
