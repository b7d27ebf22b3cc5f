//! Ride offer lifecycle types
//!
//! An offer is a standing, time-bounded invitation of one ride to one
//! driver. It is terminal once it leaves SENT.

use crate::ids::{DriverId, OfferId, RideId};
use serde::{Deserialize, Serialize};

/// Offer status set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    /// Standing and acceptable until `expires_at`
    Sent,
    /// The winning acceptance (at most one per ride)
    Accepted,
    /// Declined by the driver (terminal)
    Rejected,
    /// Deadline passed or a peer won the ride (terminal)
    Expired,
}

impl OfferStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Sent)
    }
}

/// A standing proposal of one ride to one driver with a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideOffer {
    pub id: OfferId,
    pub ride_request_id: RideId,
    pub driver_id: DriverId,
    pub status: OfferStatus,
    pub sent_at: i64,    // Unix millis
    pub expires_at: i64, // Unix millis, sent_at <= expires_at
    pub accepted_at: Option<i64>,
    pub rejected_at: Option<i64>,
}

impl RideOffer {
    /// Create a SENT offer.
    ///
    /// # Panics
    /// Panics if `expires_at` precedes `sent_at`.
    pub fn new(ride_request_id: RideId, driver_id: DriverId, sent_at: i64, expires_at: i64) -> Self {
        assert!(
            sent_at <= expires_at,
            "offer deadline must not precede its send time"
        );
        Self {
            id: OfferId::new(),
            ride_request_id,
            driver_id,
            status: OfferStatus::Sent,
            sent_at,
            expires_at,
            accepted_at: None,
            rejected_at: None,
        }
    }

    /// Still SENT and the deadline has not passed.
    pub fn is_active(&self, now: i64) -> bool {
        self.status == OfferStatus::Sent && self.expires_at > now
    }
}

/// Record shape for bulk offer creation with duplicate-skip.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOffer {
    pub ride_request_id: RideId,
    pub driver_id: DriverId,
    pub sent_at: i64,
    pub expires_at: i64,
}
