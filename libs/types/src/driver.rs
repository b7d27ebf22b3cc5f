//! Driver availability and location

use crate::geo::Coordinates;
use crate::ids::DriverId;
use serde::{Deserialize, Serialize};

/// Driver availability tri-state.
///
/// Drivers toggle between ONLINE and OFFLINE themselves; BUSY is owned by
/// the dispatch core and set only when the driver wins a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    Offline,
    Online,
    Busy,
}

impl Availability {
    /// Derived boolean view of the tri-state.
    pub fn is_online(&self) -> bool {
        matches!(self, Availability::Online)
    }
}

/// A party that may be offered and may accept rides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub phone: String,
    pub availability: Availability,
    pub location: Option<Coordinates>,
    pub created_at: i64, // Unix millis
    pub updated_at: i64, // Unix millis
}

impl Driver {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: DriverId::new(),
            name: name.into(),
            phone: phone.into(),
            availability: Availability::Offline,
            location: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}
