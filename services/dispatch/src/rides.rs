//! Ride lifecycle operations
//!
//! Passenger-facing creation, reads, and cancellation, plus the gated
//! status reports of the assigned driver. Once a ride is created the
//! passenger only ever sees its status evolve; dispatch failures surface
//! as the ride's own FAILED status, never as request errors.

use std::sync::Arc;

use tracing::info;

use store::Store;
use types::prelude::*;

use crate::clock::Clock;
use crate::matcher::Dispatcher;
use crate::notify::{Notifier, RideEvent};

/// Ride creation input as the surface receives it.
#[derive(Debug, Clone, PartialEq)]
pub struct RideDraft {
    pub pickup_text: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dropoff_text: Option<String>,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lng: Option<f64>,
}

fn paired_coords(
    lat: Option<f64>,
    lng: Option<f64>,
    which: &str,
) -> Result<Option<Coordinates>, CoreError> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng).map(Some),
        _ => Err(CoreError::invalid_argument(format!(
            "{} latitude and longitude must be provided together",
            which
        ))),
    }
}

pub struct RideService {
    store: Arc<dyn Store>,
    dispatcher: Arc<Dispatcher>,
    notifier: Arc<dyn Notifier>,
    clock: Clock,
    config: DispatchConfig,
}

impl RideService {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<Dispatcher>,
        notifier: Arc<dyn Notifier>,
        config: DispatchConfig,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            dispatcher,
            notifier,
            clock,
            config,
        }
    }

    /// Create a ride and, in the default configuration, start its dispatch
    /// task immediately.
    pub fn create(
        &self,
        passenger_id: PassengerId,
        draft: RideDraft,
    ) -> Result<RideRequest, CoreError> {
        if draft.pickup_text.trim().is_empty() {
            return Err(CoreError::invalid_argument("pickup text is required"));
        }
        let pickup = Location::new(
            draft.pickup_text.trim(),
            paired_coords(draft.pickup_lat, draft.pickup_lng, "pickup")?,
        );
        let dropoff = Location::new(
            draft.dropoff_text.unwrap_or_default().trim(),
            paired_coords(draft.dropoff_lat, draft.dropoff_lng, "dropoff")?,
        );

        let ride = self.store.create_ride(
            passenger_id,
            pickup,
            dropoff,
            self.config.initial_status,
            self.config.phase1.radius_km,
            self.clock.now_ms(),
        )?;
        info!(ride_id = %ride.id, passenger_id = %passenger_id, "ride created");

        if ride.status == RideStatus::Searching {
            self.dispatcher.begin_dispatch(ride.id);
        }
        Ok(ride)
    }

    /// Current ride state plus the assigned driver, for the owning
    /// passenger only.
    pub fn status_for_passenger(
        &self,
        passenger_id: PassengerId,
        ride_id: RideId,
    ) -> Result<(RideRequest, Option<Driver>), CoreError> {
        let ride = self
            .store
            .get_ride(ride_id)?
            .ok_or_else(|| CoreError::not_found(format!("ride {}", ride_id)))?;
        if ride.passenger_id != passenger_id {
            return Err(CoreError::forbidden("not your ride"));
        }
        let driver = match ride.assigned_driver_id {
            Some(driver_id) => self.store.get_driver(driver_id)?,
            None => None,
        };
        Ok((ride, driver))
    }

    /// Latest rides of the passenger, newest first, bounded.
    pub fn history_for_passenger(
        &self,
        passenger_id: PassengerId,
    ) -> Result<Vec<RideRequest>, CoreError> {
        self.store
            .list_rides_by_passenger(passenger_id, self.config.rides_history_read_limit)
    }

    /// Latest rides assigned to the driver, newest first, bounded.
    pub fn history_for_driver(&self, driver_id: DriverId) -> Result<Vec<RideRequest>, CoreError> {
        self.store
            .list_rides_by_driver(driver_id, self.config.rides_history_read_limit)
    }

    /// Passenger cancels a non-terminal ride. The dispatch task is torn
    /// down eagerly but would notice the terminal status on its own.
    pub fn cancel_by_passenger(
        &self,
        passenger_id: PassengerId,
        ride_id: RideId,
    ) -> Result<RideRequest, CoreError> {
        let ride = self
            .store
            .cancel_ride_by_passenger(ride_id, passenger_id, self.clock.now_ms())?;
        self.dispatcher.abort_task(ride_id);
        info!(ride_id = %ride_id, "ride canceled by passenger");
        self.notifier.publish(RideEvent::RideCanceled { ride_id });
        Ok(ride)
    }

    /// Status report from the assigned driver, gated by the legal
    /// transition set. A non-owner gets Forbidden.
    pub fn driver_report_status(
        &self,
        driver_id: DriverId,
        ride_id: RideId,
        new_status: RideStatus,
    ) -> Result<RideRequest, CoreError> {
        let affected = self.store.update_ride_status_if_owner(
            ride_id,
            driver_id,
            new_status,
            self.clock.now_ms(),
        )?;
        if affected == 0 {
            return Err(CoreError::forbidden("not the assigned driver"));
        }
        info!(ride_id = %ride_id, driver_id = %driver_id, status = ?new_status, "ride status reported");
        self.store
            .get_ride(ride_id)?
            .ok_or_else(|| CoreError::internal("ride row vanished after update"))
    }
}
