use dispatch::{AvailabilityUpdate, RideDraft};
use serde::{Deserialize, Serialize};
use types::driver::{Availability, Driver};
use types::errors::CoreError;
use types::geo::{Coordinates, Location};
use types::ids::{DriverId, OfferId, PassengerId, RideId};
use types::offer::{OfferStatus, RideOffer};
use types::ride::{RideRequest, RideStatus};

// ── Requests ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRideRequest {
    pub pickup_text: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dropoff_text: Option<String>,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lng: Option<f64>,
}

impl CreateRideRequest {
    pub fn into_draft(self) -> RideDraft {
        RideDraft {
            pickup_text: self.pickup_text,
            pickup_lat: self.pickup_lat,
            pickup_lng: self.pickup_lng,
            dropoff_text: self.dropoff_text,
            dropoff_lat: self.dropoff_lat,
            dropoff_lng: self.dropoff_lng,
        }
    }
}

/// Either the explicit tri-state or the boolean convenience flag; the
/// explicit field wins when both are present.
#[derive(Debug, Clone, Deserialize)]
pub struct SetAvailabilityRequest {
    pub availability: Option<Availability>,
    pub is_online: Option<bool>,
}

impl SetAvailabilityRequest {
    pub fn into_update(self) -> Result<AvailabilityUpdate, CoreError> {
        match (self.availability, self.is_online) {
            (Some(availability), _) => Ok(AvailabilityUpdate::Explicit(availability)),
            (None, Some(flag)) => Ok(AvailabilityUpdate::Online(flag)),
            (None, None) => Err(CoreError::invalid_argument(
                "availability or is_online is required",
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetLocationRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RideStatusUpdateRequest {
    pub status: RideStatus,
}

// ── Responses ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DriverSummary {
    pub id: DriverId,
    pub name: String,
    pub phone: String,
    pub location: Option<Coordinates>,
}

impl From<Driver> for DriverSummary {
    fn from(driver: Driver) -> Self {
        Self {
            id: driver.id,
            name: driver.name,
            phone: driver.phone,
            location: driver.location,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RideResponse {
    pub id: RideId,
    pub passenger_id: PassengerId,
    pub status: RideStatus,
    pub phase: u8,
    pub search_radius_km: f64,
    pub pickup: Location,
    pub dropoff: Location,
    pub assigned_driver: Option<DriverSummary>,
    pub phase_expires_at: Option<i64>,
    pub created_at: i64,
}

impl RideResponse {
    pub fn from_ride(ride: RideRequest, driver: Option<Driver>) -> Self {
        Self {
            id: ride.id,
            passenger_id: ride.passenger_id,
            status: ride.status,
            phase: ride.phase,
            search_radius_km: ride.search_radius_km,
            pickup: ride.pickup,
            dropoff: ride.dropoff,
            assigned_driver: driver.map(DriverSummary::from),
            phase_expires_at: ride.phase_expires_at,
            created_at: ride.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverResponse {
    pub id: DriverId,
    pub name: String,
    pub phone: String,
    pub availability: Availability,
    pub is_online: bool,
    pub location: Option<Coordinates>,
}

impl From<Driver> for DriverResponse {
    fn from(driver: Driver) -> Self {
        Self {
            id: driver.id,
            name: driver.name,
            phone: driver.phone,
            availability: driver.availability,
            is_online: driver.availability.is_online(),
            location: driver.location,
        }
    }
}

/// A ride as embedded in a driver's offer poll: enough to decide, nothing
/// that identifies the passenger before acceptance.
#[derive(Debug, Clone, Serialize)]
pub struct OfferRideSummary {
    pub id: RideId,
    pub pickup: Location,
    pub dropoff: Location,
    pub status: RideStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferResponse {
    pub id: OfferId,
    pub status: OfferStatus,
    pub sent_at: i64,
    pub expires_at: i64,
    pub ride: OfferRideSummary,
}

impl OfferResponse {
    pub fn from_pair(offer: RideOffer, ride: RideRequest) -> Self {
        Self {
            id: offer.id,
            status: offer.status,
            sent_at: offer.sent_at,
            expires_at: offer.expires_at,
            ride: OfferRideSummary {
                id: ride.id,
                pickup: ride.pickup,
                dropoff: ride.dropoff,
                status: ride.status,
            },
        }
    }
}

/// Accepted ride with the passenger contact info the winner needs.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedRideResponse {
    pub ride: RideResponse,
    pub passenger_name: String,
    pub passenger_phone: String,
}
