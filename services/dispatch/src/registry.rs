//! Driver registry write path
//!
//! Availability and location updates coming from the drivers themselves.
//! Drivers move between ONLINE and OFFLINE only; BUSY belongs to the
//! acceptance transaction.

use std::sync::Arc;

use tracing::info;

use store::Store;
use types::prelude::*;

use crate::clock::Clock;

/// Availability write as the surface accepts it: either the explicit
/// tri-state or the boolean convenience flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AvailabilityUpdate {
    Explicit(Availability),
    Online(bool),
}

impl AvailabilityUpdate {
    fn target(self) -> Availability {
        match self {
            AvailabilityUpdate::Explicit(availability) => availability,
            AvailabilityUpdate::Online(true) => Availability::Online,
            AvailabilityUpdate::Online(false) => Availability::Offline,
        }
    }
}

pub struct DriverRegistry {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl DriverRegistry {
    pub fn new(store: Arc<dyn Store>, clock: Clock) -> Self {
        Self { store, clock }
    }

    /// Apply a driver-initiated availability change.
    ///
    /// Requesting BUSY is rejected; leaving BUSY is rejected by the store
    /// while a ride is active.
    pub fn set_availability(
        &self,
        driver_id: DriverId,
        update: AvailabilityUpdate,
    ) -> Result<Driver, CoreError> {
        let target = update.target();
        if target == Availability::Busy {
            return Err(CoreError::conflict(
                "BUSY is assigned by dispatch, not requested",
            ));
        }
        let driver = self
            .store
            .set_driver_availability(driver_id, target, self.clock.now_ms())?;
        info!(driver_id = %driver_id, availability = ?driver.availability, "driver availability updated");
        Ok(driver)
    }

    /// Record the driver's position. Accepted regardless of availability.
    pub fn set_location(&self, driver_id: DriverId, lat: f64, lng: f64) -> Result<Driver, CoreError> {
        let coords = Coordinates::new(lat, lng)?;
        self.store
            .set_driver_location(driver_id, coords, self.clock.now_ms())
    }

    pub fn get(&self, driver_id: DriverId) -> Result<Driver, CoreError> {
        self.store
            .get_driver(driver_id)?
            .ok_or_else(|| CoreError::not_found(format!("driver {}", driver_id)))
    }
}
