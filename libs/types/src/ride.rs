//! Ride request lifecycle types
//!
//! A ride moves through a fixed status set; not every pair of states is a
//! legal transition. The pure transition gate lives here so both the store
//! and the request surface enforce the same rules.

use crate::geo::Location;
use crate::ids::{DriverId, PassengerId, RideId};
use serde::{Deserialize, Serialize};

/// Ride status set, ordered by lifecycle progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    /// Created but dispatch not started (auto-search disabled)
    Open,
    /// Matcher is broadcasting offer waves
    Searching,
    /// A driver won the ride
    Accepted,
    /// Assigned driver is heading to pickup
    Arriving,
    /// Passenger on board
    InProgress,
    /// Ride finished (terminal)
    Completed,
    /// Canceled by passenger or assigned driver (terminal)
    Canceled,
    /// No driver found after all phases (terminal)
    Failed,
}

impl RideStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Canceled | RideStatus::Failed
        )
    }

    /// Legal transition for a status report from the assigned driver.
    ///
    /// The forward chain is ACCEPTED → ARRIVING → IN_PROGRESS → COMPLETED;
    /// additionally any non-terminal ride may be canceled.
    pub fn driver_transition_allowed(self, to: RideStatus) -> bool {
        match (self, to) {
            (RideStatus::Accepted, RideStatus::Arriving) => true,
            (RideStatus::Arriving, RideStatus::InProgress) => true,
            (RideStatus::InProgress, RideStatus::Completed) => true,
            (from, RideStatus::Canceled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// A passenger's demand for a ride.
///
/// `phase`, `search_radius_km` and `phase_expires_at` belong to the matcher:
/// they record which offer wave is live and when it lapses, and they are
/// frozen once the ride reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: RideId,
    pub passenger_id: PassengerId,
    pub assigned_driver_id: Option<DriverId>,
    pub pickup: Location,
    pub dropoff: Location,
    pub status: RideStatus,
    pub phase: u8,
    pub search_radius_km: f64,
    pub phase_expires_at: Option<i64>, // Unix millis
    pub created_at: i64,               // Unix millis
    pub updated_at: i64,               // Unix millis
}

impl RideRequest {
    /// Create a fresh ride request in its initial status.
    pub fn new(
        passenger_id: PassengerId,
        pickup: Location,
        dropoff: Location,
        initial_status: RideStatus,
        search_radius_km: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            id: RideId::new(),
            passenger_id,
            assigned_driver_id: None,
            pickup,
            dropoff,
            status: initial_status,
            phase: 1,
            search_radius_km,
            phase_expires_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// A ride can still be won by a driver.
    pub fn is_dispatchable(&self) -> bool {
        !self.status.is_terminal() && self.assigned_driver_id.is_none()
    }
}
