//! Passenger contact record
//!
//! Registration happens out-of-band; the core reads this row to join contact
//! info onto an accepted ride.

use crate::ids::PassengerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub id: PassengerId,
    pub name: String,
    pub phone: String,
    pub created_at: i64, // Unix millis
}

impl Passenger {
    pub fn new(name: impl Into<String>, phone: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: PassengerId::new(),
            name: name.into(),
            phone: phone.into(),
            created_at: timestamp,
        }
    }
}
