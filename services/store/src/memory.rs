//! In-memory store
//!
//! A single mutex around the whole data set makes every trait method a
//! serializable transaction: two concurrent acceptances for the same ride
//! are ordered by the lock, and the loser sees the winner's writes.
//!
//! The maps mirror the persisted layout: entity tables plus a
//! (ride, driver) uniqueness index over offers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use types::prelude::*;

use crate::{AcceptedRide, CandidateFilter, Store};

// Rough degree extents for the candidate bounding box. Precise radius
// filtering happens in the matcher; this only has to over-approximate.
const KM_PER_DEG_LAT: f64 = 110.574;
const KM_PER_DEG_LNG_EQUATOR: f64 = 111.320;

#[derive(Default)]
struct Inner {
    passengers: HashMap<PassengerId, Passenger>,
    drivers: HashMap<DriverId, Driver>,
    driver_phones: HashMap<String, DriverId>,
    rides: HashMap<RideId, RideRequest>,
    offers: HashMap<OfferId, RideOffer>,
    /// Uniqueness index: at most one offer per (ride, driver) pair.
    offers_by_pair: HashMap<(RideId, DriverId), OfferId>,
}

/// Mutex-serialized in-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::internal("store mutex poisoned"))
    }
}

fn within_bounding_box(center: Coordinates, radius_km: f64, point: Coordinates) -> bool {
    let lat_delta = radius_km / KM_PER_DEG_LAT;
    // Shrinks toward the poles; clamp so the box stays finite there.
    let km_per_deg_lng = KM_PER_DEG_LNG_EQUATOR * center.lat.to_radians().cos().max(0.01);
    let lng_delta = radius_km / km_per_deg_lng;
    (point.lat - center.lat).abs() <= lat_delta && (point.lng - center.lng).abs() <= lng_delta
}

fn newest_first(rides: &mut Vec<RideRequest>) {
    rides.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
    });
}

impl Store for MemoryStore {
    // ── Parties ─────────────────────────────────────────────────────────

    fn create_passenger(&self, name: &str, phone: &str, now: i64) -> Result<Passenger, CoreError> {
        if name.trim().is_empty() || phone.trim().is_empty() {
            return Err(CoreError::invalid_argument("name and phone are required"));
        }
        let mut inner = self.lock()?;
        let passenger = Passenger::new(name, phone, now);
        inner.passengers.insert(passenger.id, passenger.clone());
        Ok(passenger)
    }

    fn create_driver(&self, name: &str, phone: &str, now: i64) -> Result<Driver, CoreError> {
        if name.trim().is_empty() || phone.trim().is_empty() {
            return Err(CoreError::invalid_argument("name and phone are required"));
        }
        let mut inner = self.lock()?;
        if inner.driver_phones.contains_key(phone) {
            return Err(CoreError::conflict("phone already registered"));
        }
        let driver = Driver::new(name, phone, now);
        inner.driver_phones.insert(phone.to_string(), driver.id);
        inner.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    fn get_passenger(&self, id: PassengerId) -> Result<Option<Passenger>, CoreError> {
        Ok(self.lock()?.passengers.get(&id).cloned())
    }

    fn get_driver(&self, id: DriverId) -> Result<Option<Driver>, CoreError> {
        Ok(self.lock()?.drivers.get(&id).cloned())
    }

    // ── Driver registry write path ──────────────────────────────────────

    fn set_driver_availability(
        &self,
        id: DriverId,
        availability: Availability,
        now: i64,
    ) -> Result<Driver, CoreError> {
        let mut inner = self.lock()?;
        let driver = inner
            .drivers
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("driver {}", id)))?;
        if driver.availability == Availability::Busy && availability != Availability::Busy {
            return Err(CoreError::conflict(
                "active ride must be resolved before changing availability",
            ));
        }
        driver.availability = availability;
        driver.updated_at = now;
        Ok(driver.clone())
    }

    fn set_driver_location(
        &self,
        id: DriverId,
        coords: Coordinates,
        now: i64,
    ) -> Result<Driver, CoreError> {
        let coords = Coordinates::new(coords.lat, coords.lng)?;
        let mut inner = self.lock()?;
        let driver = inner
            .drivers
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("driver {}", id)))?;
        driver.location = Some(coords);
        driver.updated_at = now;
        Ok(driver.clone())
    }

    fn list_candidate_drivers(&self, filter: &CandidateFilter) -> Result<Vec<Driver>, CoreError> {
        let inner = self.lock()?;
        let mut out: Vec<Driver> = inner
            .drivers
            .values()
            .filter(|d| d.availability == Availability::Online)
            .filter(|d| match (filter.center, d.location) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(center), Some(loc)) => within_bounding_box(center, filter.radius_km, loc),
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.as_uuid().cmp(b.id.as_uuid()));
        Ok(out)
    }

    // ── Rides ───────────────────────────────────────────────────────────

    fn create_ride(
        &self,
        passenger_id: PassengerId,
        pickup: Location,
        dropoff: Location,
        initial_status: RideStatus,
        search_radius_km: f64,
        now: i64,
    ) -> Result<RideRequest, CoreError> {
        let mut inner = self.lock()?;
        if !inner.passengers.contains_key(&passenger_id) {
            return Err(CoreError::not_found(format!("passenger {}", passenger_id)));
        }
        let ride = RideRequest::new(
            passenger_id,
            pickup,
            dropoff,
            initial_status,
            search_radius_km,
            now,
        );
        inner.rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    fn get_ride(&self, id: RideId) -> Result<Option<RideRequest>, CoreError> {
        Ok(self.lock()?.rides.get(&id).cloned())
    }

    fn list_rides_by_passenger(
        &self,
        passenger_id: PassengerId,
        limit: usize,
    ) -> Result<Vec<RideRequest>, CoreError> {
        let inner = self.lock()?;
        let mut rides: Vec<RideRequest> = inner
            .rides
            .values()
            .filter(|r| r.passenger_id == passenger_id)
            .cloned()
            .collect();
        newest_first(&mut rides);
        rides.truncate(limit);
        Ok(rides)
    }

    fn list_rides_by_driver(
        &self,
        driver_id: DriverId,
        limit: usize,
    ) -> Result<Vec<RideRequest>, CoreError> {
        let inner = self.lock()?;
        let mut rides: Vec<RideRequest> = inner
            .rides
            .values()
            .filter(|r| r.assigned_driver_id == Some(driver_id))
            .cloned()
            .collect();
        newest_first(&mut rides);
        rides.truncate(limit);
        Ok(rides)
    }

    fn list_searching_rides(&self) -> Result<Vec<RideRequest>, CoreError> {
        let inner = self.lock()?;
        let mut rides: Vec<RideRequest> = inner
            .rides
            .values()
            .filter(|r| r.status == RideStatus::Searching)
            .cloned()
            .collect();
        newest_first(&mut rides);
        Ok(rides)
    }

    fn update_ride_phase(
        &self,
        id: RideId,
        phase: u8,
        radius_km: f64,
        expires_at: i64,
        now: i64,
    ) -> Result<RideRequest, CoreError> {
        let mut inner = self.lock()?;
        let ride = inner
            .rides
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("ride {}", id)))?;
        if ride.status.is_terminal() {
            return Err(CoreError::conflict("ride already terminal"));
        }
        // A winner may have landed between the matcher's read and this
        // write; the phase write must not regress an assigned ride.
        if ride.assigned_driver_id.is_some()
            || !matches!(ride.status, RideStatus::Open | RideStatus::Searching)
        {
            return Err(CoreError::conflict("ride no longer searchable"));
        }
        ride.status = RideStatus::Searching;
        ride.phase = phase;
        ride.search_radius_km = radius_km;
        ride.phase_expires_at = Some(expires_at);
        ride.updated_at = now;
        Ok(ride.clone())
    }

    fn update_ride_status_if_owner(
        &self,
        id: RideId,
        driver_id: DriverId,
        new_status: RideStatus,
        now: i64,
    ) -> Result<usize, CoreError> {
        let mut inner = self.lock()?;
        let ride = inner
            .rides
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("ride {}", id)))?;
        if ride.assigned_driver_id != Some(driver_id) {
            return Ok(0);
        }
        if ride.status.is_terminal() {
            return Err(CoreError::conflict("ride already terminal"));
        }
        if !ride.status.driver_transition_allowed(new_status) {
            return Err(CoreError::conflict(format!(
                "illegal transition {:?} -> {:?}",
                ride.status, new_status
            )));
        }
        let ride = inner.rides.get_mut(&id).expect("ride checked above");
        ride.status = new_status;
        ride.updated_at = now;
        if new_status.is_terminal() {
            ride.phase_expires_at = None;
            // Terminal ride releases its driver.
            if let Some(driver) = inner.drivers.get_mut(&driver_id) {
                driver.availability = Availability::Online;
                driver.updated_at = now;
            }
        }
        Ok(1)
    }

    fn fail_ride_if_searching(&self, id: RideId, now: i64) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        let ride = inner
            .rides
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("ride {}", id)))?;
        if ride.status != RideStatus::Searching || ride.assigned_driver_id.is_some() {
            return Ok(false);
        }
        ride.status = RideStatus::Failed;
        ride.phase_expires_at = None;
        ride.updated_at = now;
        Ok(true)
    }

    fn cancel_ride_by_passenger(
        &self,
        id: RideId,
        passenger_id: PassengerId,
        now: i64,
    ) -> Result<RideRequest, CoreError> {
        let mut inner = self.lock()?;
        let ride = inner
            .rides
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("ride {}", id)))?;
        if ride.passenger_id != passenger_id {
            return Err(CoreError::forbidden("not your ride"));
        }
        if ride.status.is_terminal() {
            return Err(CoreError::conflict("ride already terminal"));
        }
        let assigned = ride.assigned_driver_id;
        let ride = inner.rides.get_mut(&id).expect("ride checked above");
        ride.status = RideStatus::Canceled;
        ride.phase_expires_at = None;
        ride.updated_at = now;
        let canceled = ride.clone();
        // The driver link survives on the canceled ride, but the driver is
        // free to take new work.
        if let Some(driver_id) = assigned {
            if let Some(driver) = inner.drivers.get_mut(&driver_id) {
                driver.availability = Availability::Online;
                driver.updated_at = now;
            }
        }
        Ok(canceled)
    }

    // ── Offers ──────────────────────────────────────────────────────────

    fn create_offers_skip_duplicates(&self, records: &[NewOffer]) -> Result<usize, CoreError> {
        for record in records {
            if record.sent_at > record.expires_at {
                return Err(CoreError::invalid_argument(
                    "offer deadline precedes its send time",
                ));
            }
        }
        let mut inner = self.lock()?;
        let mut created = 0;
        for record in records {
            let pair = (record.ride_request_id, record.driver_id);
            if inner.offers_by_pair.contains_key(&pair) {
                debug!(ride_id = %pair.0, driver_id = %pair.1, "skipping duplicate offer");
                continue;
            }
            let offer = RideOffer::new(
                record.ride_request_id,
                record.driver_id,
                record.sent_at,
                record.expires_at,
            );
            inner.offers_by_pair.insert(pair, offer.id);
            inner.offers.insert(offer.id, offer);
            created += 1;
        }
        Ok(created)
    }

    fn expire_sent_offers(&self, ride_id: RideId, now: i64) -> Result<usize, CoreError> {
        let mut inner = self.lock()?;
        let mut affected = 0;
        for offer in inner.offers.values_mut() {
            if offer.ride_request_id == ride_id
                && offer.status == OfferStatus::Sent
                && offer.expires_at <= now
            {
                offer.status = OfferStatus::Expired;
                affected += 1;
            }
        }
        Ok(affected)
    }

    fn expire_sent_offers_by_driver(
        &self,
        driver_id: DriverId,
        now: i64,
    ) -> Result<usize, CoreError> {
        let mut inner = self.lock()?;
        let mut affected = 0;
        for offer in inner.offers.values_mut() {
            if offer.driver_id == driver_id
                && offer.status == OfferStatus::Sent
                && offer.expires_at <= now
            {
                offer.status = OfferStatus::Expired;
                affected += 1;
            }
        }
        Ok(affected)
    }

    fn get_offer(&self, id: OfferId) -> Result<Option<RideOffer>, CoreError> {
        Ok(self.lock()?.offers.get(&id).cloned())
    }

    fn list_active_offers(
        &self,
        driver_id: DriverId,
        now: i64,
        limit: usize,
    ) -> Result<Vec<(RideOffer, RideRequest)>, CoreError> {
        let inner = self.lock()?;
        let mut active: Vec<(RideOffer, RideRequest)> = inner
            .offers
            .values()
            .filter(|o| o.driver_id == driver_id && o.is_active(now))
            .filter_map(|o| {
                inner
                    .rides
                    .get(&o.ride_request_id)
                    .map(|r| (o.clone(), r.clone()))
            })
            .collect();
        active.sort_by(|a, b| {
            b.0.sent_at
                .cmp(&a.0.sent_at)
                .then_with(|| b.0.id.as_uuid().cmp(a.0.id.as_uuid()))
        });
        active.truncate(limit);
        Ok(active)
    }

    fn reject_offer(
        &self,
        id: OfferId,
        driver_id: DriverId,
        now: i64,
    ) -> Result<RideOffer, CoreError> {
        let mut inner = self.lock()?;
        let offer = inner
            .offers
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("offer {}", id)))?;
        if offer.driver_id != driver_id {
            return Err(CoreError::forbidden("not your offer"));
        }
        if offer.status != OfferStatus::Sent {
            return Err(CoreError::conflict("offer not active"));
        }
        if offer.expires_at <= now {
            offer.status = OfferStatus::Expired;
            return Err(CoreError::conflict("expired"));
        }
        offer.status = OfferStatus::Rejected;
        offer.rejected_at = Some(now);
        Ok(offer.clone())
    }

    fn accept_offer_atomic(
        &self,
        id: OfferId,
        driver_id: DriverId,
        now: i64,
    ) -> Result<AcceptedRide, CoreError> {
        let mut inner = self.lock()?;

        let offer = inner
            .offers
            .get(&id)
            .ok_or_else(|| CoreError::not_found(format!("offer {}", id)))?;
        if offer.driver_id != driver_id {
            return Err(CoreError::forbidden("not your offer"));
        }
        if offer.status != OfferStatus::Sent {
            return Err(CoreError::conflict("offer not active"));
        }
        if offer.expires_at <= now {
            // The expiry write commits even though the call fails.
            let offer = inner.offers.get_mut(&id).expect("offer checked above");
            offer.status = OfferStatus::Expired;
            return Err(CoreError::conflict("expired"));
        }
        let ride_id = offer.ride_request_id;

        let ride = inner
            .rides
            .get(&ride_id)
            .ok_or_else(|| CoreError::not_found(format!("ride {}", ride_id)))?;
        if ride.assigned_driver_id.is_some() {
            return Err(CoreError::conflict("already taken"));
        }
        if ride.status.is_terminal() {
            return Err(CoreError::conflict("ride not dispatchable"));
        }
        let driver = inner
            .drivers
            .get(&driver_id)
            .ok_or_else(|| CoreError::not_found(format!("driver {}", driver_id)))?;
        if driver.availability == Availability::Busy {
            return Err(CoreError::conflict("driver busy"));
        }

        // All checks passed; apply the whole assignment.
        let ride = inner.rides.get_mut(&ride_id).expect("ride checked above");
        ride.assigned_driver_id = Some(driver_id);
        ride.status = RideStatus::Accepted;
        ride.phase_expires_at = None;
        ride.updated_at = now;
        let passenger_id = ride.passenger_id;
        let accepted_ride = ride.clone();

        let offer = inner.offers.get_mut(&id).expect("offer checked above");
        offer.status = OfferStatus::Accepted;
        offer.accepted_at = Some(now);

        for other in inner.offers.values_mut() {
            if other.ride_request_id == ride_id
                && other.id != id
                && other.status == OfferStatus::Sent
            {
                other.status = OfferStatus::Expired;
            }
        }

        let driver = inner
            .drivers
            .get_mut(&driver_id)
            .expect("driver checked above");
        driver.availability = Availability::Busy;
        driver.updated_at = now;

        let passenger = inner
            .passengers
            .get(&passenger_id)
            .cloned()
            .ok_or_else(|| CoreError::internal("passenger row missing for ride"))?;

        Ok(AcceptedRide {
            ride: accepted_ride,
            passenger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const T0: i64 = 1_700_000_000_000;

    fn seeded() -> (MemoryStore, Passenger, Driver) {
        let store = MemoryStore::new();
        let passenger = store.create_passenger("Deniz", "+905550000001", T0).unwrap();
        let driver = store.create_driver("Ayşe", "+905550000002", T0).unwrap();
        (store, passenger, driver)
    }

    fn coords(lat: f64, lng: f64) -> Coordinates {
        Coordinates::new(lat, lng).unwrap()
    }

    fn searching_ride(store: &MemoryStore, passenger: &Passenger) -> RideRequest {
        store
            .create_ride(
                passenger.id,
                Location::new("pickup", Some(coords(41.02, 28.99))),
                Location::new("dropoff", None),
                RideStatus::Searching,
                5.0,
                T0,
            )
            .unwrap()
    }

    fn sent_offer(store: &MemoryStore, ride: &RideRequest, driver: &Driver) -> RideOffer {
        let created = store
            .create_offers_skip_duplicates(&[NewOffer {
                ride_request_id: ride.id,
                driver_id: driver.id,
                sent_at: T0,
                expires_at: T0 + 15_000,
            }])
            .unwrap();
        assert_eq!(created, 1);
        store
            .list_active_offers(driver.id, T0, 20)
            .unwrap()
            .remove(0)
            .0
    }

    // ── Parties ─────────────────────────────────────────────────────────

    #[test]
    fn test_driver_phone_uniqueness() {
        let store = MemoryStore::new();
        store.create_driver("A", "+90555", T0).unwrap();
        let err = store.create_driver("B", "+90555", T0).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_blank_party_fields_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.create_passenger("", "+90", T0),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.create_driver("X", "  ", T0),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    // ── Driver registry ─────────────────────────────────────────────────

    #[test]
    fn test_availability_toggle() {
        let (store, _, driver) = seeded();
        let d = store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        assert_eq!(d.availability, Availability::Online);
        let d = store
            .set_driver_availability(driver.id, Availability::Offline, T0)
            .unwrap();
        assert_eq!(d.availability, Availability::Offline);
    }

    #[test]
    fn test_busy_driver_cannot_change_availability() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        let err = store
            .set_driver_availability(driver.id, Availability::Offline, T0 + 2)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        let err = store
            .set_driver_availability(driver.id, Availability::Online, T0 + 2)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_location_update_while_busy_is_fine() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        let d = store
            .set_driver_location(driver.id, coords(41.0, 29.0), T0 + 2)
            .unwrap();
        assert_eq!(d.location, Some(coords(41.0, 29.0)));
    }

    #[test]
    fn test_candidate_filter_online_only() {
        let (store, _, driver) = seeded();
        let other = store.create_driver("B", "+905551", T0).unwrap();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        // `other` stays OFFLINE.
        let candidates = store
            .list_candidate_drivers(&CandidateFilter::all_online())
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, driver.id);
        assert_ne!(candidates[0].id, other.id);
    }

    #[test]
    fn test_candidate_filter_bounding_box() {
        let (store, _, near) = seeded();
        let far = store.create_driver("Far", "+905551", T0).unwrap();
        let unlocated = store.create_driver("NoLoc", "+905552", T0).unwrap();
        for d in [near.id, far.id, unlocated.id] {
            store
                .set_driver_availability(d, Availability::Online, T0)
                .unwrap();
        }
        store
            .set_driver_location(near.id, coords(41.02, 28.99), T0)
            .unwrap();
        store
            .set_driver_location(far.id, coords(42.5, 28.99), T0)
            .unwrap();

        let center = coords(41.02, 28.99);
        let candidates = store
            .list_candidate_drivers(&CandidateFilter::within(center, 5.0))
            .unwrap();
        let ids: Vec<DriverId> = candidates.iter().map(|d| d.id).collect();
        assert!(ids.contains(&near.id));
        assert!(!ids.contains(&far.id), "150 km away is outside any box");
        assert!(!ids.contains(&unlocated.id), "no location, no box membership");
    }

    // ── Rides ───────────────────────────────────────────────────────────

    #[test]
    fn test_create_ride_defaults() {
        let (store, passenger, _) = seeded();
        let ride = searching_ride(&store, &passenger);
        assert_eq!(ride.status, RideStatus::Searching);
        assert_eq!(ride.phase, 1);
        assert_eq!(ride.search_radius_km, 5.0);
        assert!(ride.assigned_driver_id.is_none());
    }

    #[test]
    fn test_create_ride_unknown_passenger() {
        let store = MemoryStore::new();
        let err = store
            .create_ride(
                PassengerId::new(),
                Location::new("a", None),
                Location::new("b", None),
                RideStatus::Searching,
                5.0,
                T0,
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn test_ride_history_newest_first_and_bounded() {
        let (store, passenger, _) = seeded();
        for i in 0..5 {
            store
                .create_ride(
                    passenger.id,
                    Location::new(format!("p{}", i), None),
                    Location::new("d", None),
                    RideStatus::Searching,
                    5.0,
                    T0 + i,
                )
                .unwrap();
        }
        let rides = store.list_rides_by_passenger(passenger.id, 3).unwrap();
        assert_eq!(rides.len(), 3);
        assert_eq!(rides[0].created_at, T0 + 4);
        assert_eq!(rides[2].created_at, T0 + 2);
    }

    #[test]
    fn test_update_ride_phase_raises_open_to_searching() {
        let (store, passenger, _) = seeded();
        let ride = store
            .create_ride(
                passenger.id,
                Location::new("a", None),
                Location::new("b", None),
                RideStatus::Open,
                5.0,
                T0,
            )
            .unwrap();
        let updated = store
            .update_ride_phase(ride.id, 1, 5.0, T0 + 15_000, T0)
            .unwrap();
        assert_eq!(updated.status, RideStatus::Searching);
        assert_eq!(updated.phase_expires_at, Some(T0 + 15_000));
    }

    #[test]
    fn test_update_ride_phase_rejects_terminal_and_assigned() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        let err = store
            .update_ride_phase(ride.id, 2, 5.0, T0 + 30_000, T0 + 2)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        let failed = searching_ride(&store, &passenger);
        store.fail_ride_if_searching(failed.id, T0 + 3).unwrap();
        let err = store
            .update_ride_phase(failed.id, 2, 5.0, T0 + 30_000, T0 + 4)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_fail_ride_is_conditional() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        // Assigned ride refuses the failure write.
        assert!(!store.fail_ride_if_searching(ride.id, T0 + 2).unwrap());
        let ride = store.get_ride(ride.id).unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
    }

    // ── Driver status reports ───────────────────────────────────────────

    #[test]
    fn test_owner_update_forward_chain_and_release() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        for status in [
            RideStatus::Arriving,
            RideStatus::InProgress,
            RideStatus::Completed,
        ] {
            let n = store
                .update_ride_status_if_owner(ride.id, driver.id, status, T0 + 2)
                .unwrap();
            assert_eq!(n, 1);
        }
        let ride = store.get_ride(ride.id).unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert_eq!(ride.assigned_driver_id, Some(driver.id));
        // Completion hands the driver back to the pool.
        let driver = store.get_driver(driver.id).unwrap().unwrap();
        assert_eq!(driver.availability, Availability::Online);
    }

    #[test]
    fn test_owner_update_returns_zero_for_non_owner() {
        let (store, passenger, driver) = seeded();
        let intruder = store.create_driver("X", "+905559", T0).unwrap();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        let n = store
            .update_ride_status_if_owner(ride.id, intruder.id, RideStatus::Arriving, T0 + 2)
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_owner_update_rejects_skipping_states() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        let err = store
            .update_ride_status_if_owner(ride.id, driver.id, RideStatus::Completed, T0 + 2)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_terminal_ride_is_frozen() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();
        store
            .update_ride_status_if_owner(ride.id, driver.id, RideStatus::Canceled, T0 + 2)
            .unwrap();

        let before = store.get_ride(ride.id).unwrap().unwrap();
        let err = store
            .update_ride_status_if_owner(ride.id, driver.id, RideStatus::Arriving, T0 + 3)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        let after = store.get_ride(ride.id).unwrap().unwrap();
        assert_eq!(before, after, "terminal ride must be unchanged");
    }

    #[test]
    fn test_passenger_cancel_releases_driver_keeps_link() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);
        store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();

        let canceled = store
            .cancel_ride_by_passenger(ride.id, passenger.id, T0 + 2)
            .unwrap();
        assert_eq!(canceled.status, RideStatus::Canceled);
        assert_eq!(canceled.assigned_driver_id, Some(driver.id));
        let driver = store.get_driver(driver.id).unwrap().unwrap();
        assert_eq!(driver.availability, Availability::Online);
    }

    #[test]
    fn test_cancel_requires_ownership_and_non_terminal() {
        let (store, passenger, _) = seeded();
        let stranger = store.create_passenger("S", "+905558", T0).unwrap();
        let ride = searching_ride(&store, &passenger);

        let err = store
            .cancel_ride_by_passenger(ride.id, stranger.id, T0 + 1)
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        store.cancel_ride_by_passenger(ride.id, passenger.id, T0 + 1).unwrap();
        let err = store
            .cancel_ride_by_passenger(ride.id, passenger.id, T0 + 2)
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    // ── Offers ──────────────────────────────────────────────────────────

    #[test]
    fn test_duplicate_offers_skipped() {
        let (store, passenger, driver) = seeded();
        let ride = searching_ride(&store, &passenger);
        let record = NewOffer {
            ride_request_id: ride.id,
            driver_id: driver.id,
            sent_at: T0,
            expires_at: T0 + 15_000,
        };
        assert_eq!(store.create_offers_skip_duplicates(&[record.clone()]).unwrap(), 1);
        // Re-offering the same pair in a later phase creates nothing.
        let again = NewOffer {
            sent_at: T0 + 20_000,
            expires_at: T0 + 27_000,
            ..record
        };
        assert_eq!(store.create_offers_skip_duplicates(&[again]).unwrap(), 0);
    }

    #[test]
    fn test_inverted_deadline_rejected() {
        let (store, passenger, driver) = seeded();
        let ride = searching_ride(&store, &passenger);
        let err = store
            .create_offers_skip_duplicates(&[NewOffer {
                ride_request_id: ride.id,
                driver_id: driver.id,
                sent_at: T0 + 10,
                expires_at: T0,
            }])
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_expire_sweep_counts_and_is_idempotent() {
        let (store, passenger, driver) = seeded();
        let other = store.create_driver("B", "+905551", T0).unwrap();
        let ride = searching_ride(&store, &passenger);
        store
            .create_offers_skip_duplicates(&[
                NewOffer {
                    ride_request_id: ride.id,
                    driver_id: driver.id,
                    sent_at: T0,
                    expires_at: T0 + 7_000,
                },
                NewOffer {
                    ride_request_id: ride.id,
                    driver_id: other.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                },
            ])
            .unwrap();

        // Only the 7s offer has lapsed at T0+8s.
        assert_eq!(store.expire_sent_offers(ride.id, T0 + 8_000).unwrap(), 1);
        assert_eq!(store.expire_sent_offers(ride.id, T0 + 8_000).unwrap(), 0);
        assert_eq!(store.expire_sent_offers(ride.id, T0 + 16_000).unwrap(), 1);
    }

    #[test]
    fn test_active_offers_hide_lapsed_and_bound() {
        let (store, passenger, driver) = seeded();
        let ride = searching_ride(&store, &passenger);
        store
            .create_offers_skip_duplicates(&[NewOffer {
                ride_request_id: ride.id,
                driver_id: driver.id,
                sent_at: T0,
                expires_at: T0 + 7_000,
            }])
            .unwrap();

        assert_eq!(store.list_active_offers(driver.id, T0, 20).unwrap().len(), 1);
        // Past the deadline the offer vanishes from the active read even
        // before any sweep runs.
        assert_eq!(
            store.list_active_offers(driver.id, T0 + 7_000, 20).unwrap().len(),
            0
        );
    }

    #[test]
    fn test_reject_offer() {
        let (store, passenger, driver) = seeded();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);

        let rejected = store.reject_offer(offer.id, driver.id, T0 + 1).unwrap();
        assert_eq!(rejected.status, OfferStatus::Rejected);
        assert_eq!(rejected.rejected_at, Some(T0 + 1));

        let err = store.reject_offer(offer.id, driver.id, T0 + 2).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    // ── Acceptance ──────────────────────────────────────────────────────

    #[test]
    fn test_accept_happy_path() {
        let (store, passenger, driver) = seeded();
        let rival = store.create_driver("B", "+905551", T0).unwrap();
        for d in [driver.id, rival.id] {
            store.set_driver_availability(d, Availability::Online, T0).unwrap();
        }
        let ride = searching_ride(&store, &passenger);
        store
            .create_offers_skip_duplicates(&[
                NewOffer {
                    ride_request_id: ride.id,
                    driver_id: driver.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                },
                NewOffer {
                    ride_request_id: ride.id,
                    driver_id: rival.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                },
            ])
            .unwrap();
        let offer = store.list_active_offers(driver.id, T0, 20).unwrap().remove(0).0;

        let accepted = store.accept_offer_atomic(offer.id, driver.id, T0 + 1).unwrap();
        assert_eq!(accepted.ride.status, RideStatus::Accepted);
        assert_eq!(accepted.ride.assigned_driver_id, Some(driver.id));
        assert_eq!(accepted.ride.phase_expires_at, None);
        assert_eq!(accepted.passenger.id, passenger.id);

        // The rival's standing offer is swept in the same transaction.
        assert_eq!(store.list_active_offers(rival.id, T0 + 1, 20).unwrap().len(), 0);
        let driver = store.get_driver(driver.id).unwrap().unwrap();
        assert_eq!(driver.availability, Availability::Busy);
    }

    #[test]
    fn test_accept_requires_offer_ownership() {
        let (store, passenger, driver) = seeded();
        let intruder = store.create_driver("X", "+905559", T0).unwrap();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);

        let err = store.accept_offer_atomic(offer.id, intruder.id, T0 + 1).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[test]
    fn test_accept_expired_marks_offer() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let ride = searching_ride(&store, &passenger);
        let offer = sent_offer(&store, &ride, &driver);

        let err = store
            .accept_offer_atomic(offer.id, driver.id, T0 + 16_000)
            .unwrap_err();
        assert_eq!(err, CoreError::conflict("expired"));
        // The expiry write survives the failed call.
        let offer = store.get_offer(offer.id).unwrap().unwrap();
        assert_eq!(offer.status, OfferStatus::Expired);
    }

    #[test]
    fn test_second_accept_conflicts() {
        let (store, passenger, d1) = seeded();
        let d2 = store.create_driver("B", "+905551", T0).unwrap();
        for d in [d1.id, d2.id] {
            store.set_driver_availability(d, Availability::Online, T0).unwrap();
        }
        let ride = searching_ride(&store, &passenger);
        store
            .create_offers_skip_duplicates(&[
                NewOffer {
                    ride_request_id: ride.id,
                    driver_id: d1.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                },
                NewOffer {
                    ride_request_id: ride.id,
                    driver_id: d2.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                },
            ])
            .unwrap();
        let o1 = store.list_active_offers(d1.id, T0, 20).unwrap().remove(0).0;
        let o2 = store.list_active_offers(d2.id, T0, 20).unwrap().remove(0).0;

        store.accept_offer_atomic(o1.id, d1.id, T0 + 1).unwrap();
        let err = store.accept_offer_atomic(o2.id, d2.id, T0 + 2).unwrap_err();
        // The winner's sweep expired the loser's offer first.
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[test]
    fn test_busy_driver_cannot_accept_second_ride() {
        let (store, passenger, driver) = seeded();
        store
            .set_driver_availability(driver.id, Availability::Online, T0)
            .unwrap();
        let first = searching_ride(&store, &passenger);
        let second = searching_ride(&store, &passenger);
        store
            .create_offers_skip_duplicates(&[
                NewOffer {
                    ride_request_id: first.id,
                    driver_id: driver.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                },
                NewOffer {
                    ride_request_id: second.id,
                    driver_id: driver.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                },
            ])
            .unwrap();
        let offers = store.list_active_offers(driver.id, T0, 20).unwrap();
        let (first_offer, second_offer) = (offers[0].0.clone(), offers[1].0.clone());

        store.accept_offer_atomic(first_offer.id, driver.id, T0 + 1).unwrap();
        let err = store
            .accept_offer_atomic(second_offer.id, driver.id, T0 + 2)
            .unwrap_err();
        assert_eq!(err, CoreError::conflict("driver busy"));
        // The driver still owns exactly one non-terminal ride.
        assert_eq!(store.list_rides_by_driver(driver.id, 50).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_accepts_one_winner() {
        let (store, passenger, _) = seeded();
        let store = Arc::new(store);
        let ride = searching_ride(&store, &passenger);

        let mut offers = Vec::new();
        for i in 0..8 {
            let driver = store
                .create_driver(&format!("D{}", i), &format!("+9055500100{}", i), T0)
                .unwrap();
            store
                .set_driver_availability(driver.id, Availability::Online, T0)
                .unwrap();
            store
                .create_offers_skip_duplicates(&[NewOffer {
                    ride_request_id: ride.id,
                    driver_id: driver.id,
                    sent_at: T0,
                    expires_at: T0 + 15_000,
                }])
                .unwrap();
            let offer = store.list_active_offers(driver.id, T0, 20).unwrap().remove(0).0;
            offers.push((offer.id, driver.id));
        }

        let handles: Vec<_> = offers
            .into_iter()
            .map(|(offer_id, driver_id)| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.accept_offer_atomic(offer_id, driver_id, T0 + 1))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one acceptance must commit");
        for r in &results {
            if let Err(e) = r {
                assert!(matches!(e, CoreError::Conflict(_)), "losers see Conflict, got {:?}", e);
            }
        }

        let ride = store.get_ride(ride.id).unwrap().unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
        let winner = ride.assigned_driver_id.expect("winner recorded");
        let winner_rides = store.list_rides_by_driver(winner, 50).unwrap();
        assert_eq!(winner_rides.len(), 1);
    }
}
