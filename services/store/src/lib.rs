//! Transactional persistence for the dispatch core
//!
//! The store is the single source of truth: every multi-row invariant
//! (single winner per ride, offer/ride coherence, driver availability) is
//! maintained inside single store operations, and each operation is atomic
//! with respect to every other. Callers never hold state across operations
//! that another writer could invalidate.
//!
//! **Key invariants upheld here:**
//! - At most one offer per (ride, driver) pair
//! - At most one ACCEPTED offer per ride, matching the ride's assigned driver
//! - Terminal rides are frozen
//! - A BUSY driver owns a non-terminal ride; releasing the ride releases
//!   the driver

pub mod memory;

use types::prelude::*;

pub use memory::MemoryStore;

/// Candidate-driver query filter.
///
/// The store always filters to `availability = ONLINE`. When a center is
/// present it may additionally pre-filter by a bounding box around it;
/// precise radius filtering is the matcher's job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateFilter {
    pub center: Option<Coordinates>,
    pub radius_km: f64,
}

impl CandidateFilter {
    /// Every ONLINE driver, located or not.
    pub fn all_online() -> Self {
        Self {
            center: None,
            radius_km: 0.0,
        }
    }

    /// ONLINE drivers roughly within `radius_km` of `center`.
    pub fn within(center: Coordinates, radius_km: f64) -> Self {
        Self {
            center: Some(center),
            radius_km,
        }
    }
}

/// The updated ride joined with passenger contact info, as returned by a
/// winning acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedRide {
    pub ride: RideRequest,
    pub passenger: Passenger,
}

/// Transactional store contract.
///
/// Every method is atomic. Implementations surface `NotFound`, `Conflict`,
/// `InvalidArgument`, or `Internal` error kinds only.
pub trait Store: Send + Sync {
    // ── Parties (registered out-of-band; exposed for seeding) ───────────

    fn create_passenger(&self, name: &str, phone: &str, now: i64) -> Result<Passenger, CoreError>;

    /// Enforces the uniqueness constraint on driver phone numbers.
    fn create_driver(&self, name: &str, phone: &str, now: i64) -> Result<Driver, CoreError>;

    fn get_passenger(&self, id: PassengerId) -> Result<Option<Passenger>, CoreError>;

    fn get_driver(&self, id: DriverId) -> Result<Option<Driver>, CoreError>;

    // ── Driver registry write path ──────────────────────────────────────

    /// Driver-initiated availability write. Any change while the driver is
    /// currently BUSY is a `Conflict`: the active ride must be resolved
    /// first. The acceptance transaction is the only writer of BUSY.
    fn set_driver_availability(
        &self,
        id: DriverId,
        availability: Availability,
        now: i64,
    ) -> Result<Driver, CoreError>;

    /// Location updates are accepted regardless of availability.
    fn set_driver_location(&self, id: DriverId, coords: Coordinates, now: i64)
        -> Result<Driver, CoreError>;

    fn list_candidate_drivers(&self, filter: &CandidateFilter) -> Result<Vec<Driver>, CoreError>;

    // ── Rides ───────────────────────────────────────────────────────────

    fn create_ride(
        &self,
        passenger_id: PassengerId,
        pickup: Location,
        dropoff: Location,
        initial_status: RideStatus,
        search_radius_km: f64,
        now: i64,
    ) -> Result<RideRequest, CoreError>;

    fn get_ride(&self, id: RideId) -> Result<Option<RideRequest>, CoreError>;

    /// Newest first, bounded by `limit`.
    fn list_rides_by_passenger(
        &self,
        passenger_id: PassengerId,
        limit: usize,
    ) -> Result<Vec<RideRequest>, CoreError>;

    /// Newest first, bounded by `limit`.
    fn list_rides_by_driver(
        &self,
        driver_id: DriverId,
        limit: usize,
    ) -> Result<Vec<RideRequest>, CoreError>;

    /// Every ride currently in SEARCHING, for startup reconciliation.
    fn list_searching_rides(&self) -> Result<Vec<RideRequest>, CoreError>;

    /// Persist the live phase for a ride and raise OPEN to SEARCHING.
    /// `Conflict` if the ride is terminal.
    fn update_ride_phase(
        &self,
        id: RideId,
        phase: u8,
        radius_km: f64,
        expires_at: i64,
        now: i64,
    ) -> Result<RideRequest, CoreError>;

    /// Status report from a driver, applied only when the current
    /// `assigned_driver_id` matches. Returns rows affected: 0 means the
    /// caller does not own the ride. Illegal transitions are a `Conflict`.
    /// A terminal transition (COMPLETED, CANCELED) releases the driver back
    /// to ONLINE in the same transaction.
    fn update_ride_status_if_owner(
        &self,
        id: RideId,
        driver_id: DriverId,
        new_status: RideStatus,
        now: i64,
    ) -> Result<usize, CoreError>;

    /// Terminal no-driver-found write, conditional on the ride still being
    /// in SEARCHING with no assigned driver. Returns whether it applied.
    fn fail_ride_if_searching(&self, id: RideId, now: i64) -> Result<bool, CoreError>;

    /// Passenger-initiated cancellation of a non-terminal ride. An assigned
    /// driver is released to ONLINE; the driver link on the ride survives.
    fn cancel_ride_by_passenger(
        &self,
        id: RideId,
        passenger_id: PassengerId,
        now: i64,
    ) -> Result<RideRequest, CoreError>;

    // ── Offers ──────────────────────────────────────────────────────────

    /// Bulk-create SENT offers, silently skipping records whose
    /// (ride, driver) pair already exists. Returns the created count.
    fn create_offers_skip_duplicates(&self, records: &[NewOffer]) -> Result<usize, CoreError>;

    /// Expire every SENT offer of the ride whose deadline has passed.
    /// Returns rows affected.
    fn expire_sent_offers(&self, ride_id: RideId, now: i64) -> Result<usize, CoreError>;

    /// Same sweep, scoped to one driver's offers across all rides.
    fn expire_sent_offers_by_driver(&self, driver_id: DriverId, now: i64)
        -> Result<usize, CoreError>;

    fn get_offer(&self, id: OfferId) -> Result<Option<RideOffer>, CoreError>;

    /// SENT offers of the driver with `expires_at > now`, each joined with
    /// its ride, newest first, bounded by `limit`.
    fn list_active_offers(
        &self,
        driver_id: DriverId,
        now: i64,
        limit: usize,
    ) -> Result<Vec<(RideOffer, RideRequest)>, CoreError>;

    /// Driver declines a SENT offer it owns.
    fn reject_offer(&self, id: OfferId, driver_id: DriverId, now: i64)
        -> Result<RideOffer, CoreError>;

    /// The single-winner acceptance transaction. Between two concurrent
    /// acceptances for the same ride, exactly one succeeds; the loser
    /// observes `Conflict`.
    fn accept_offer_atomic(
        &self,
        id: OfferId,
        driver_id: DriverId,
        now: i64,
    ) -> Result<AcceptedRide, CoreError>;
}
