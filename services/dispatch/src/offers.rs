//! Driver-facing offer operations
//!
//! The read path sweeps the caller's lapsed offers first, so a driver never
//! sees an offer that is past its deadline; an offer a peer won simply
//! vanishes from the next poll.

use std::sync::Arc;

use tracing::info;

use store::{AcceptedRide, Store};
use types::prelude::*;

use crate::clock::Clock;
use crate::notify::{Notifier, RideEvent};

pub struct OfferService {
    store: Arc<dyn Store>,
    clock: Clock,
    notifier: Arc<dyn Notifier>,
    config: DispatchConfig,
}

impl OfferService {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        config: DispatchConfig,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            config,
        }
    }

    /// The caller's standing offers, each joined with its ride. Runs the
    /// expiration sweep for the caller before reading.
    pub fn active(&self, driver_id: DriverId) -> Result<Vec<(RideOffer, RideRequest)>, CoreError> {
        let now = self.clock.now_ms();
        self.store.expire_sent_offers_by_driver(driver_id, now)?;
        self.store
            .list_active_offers(driver_id, now, self.config.offers_active_read_limit)
    }

    /// Winner-takes-the-ride acceptance.
    pub fn accept(&self, driver_id: DriverId, offer_id: OfferId) -> Result<AcceptedRide, CoreError> {
        let accepted = self
            .store
            .accept_offer_atomic(offer_id, driver_id, self.clock.now_ms())?;
        info!(
            ride_id = %accepted.ride.id,
            driver_id = %driver_id,
            "offer accepted, ride assigned"
        );
        self.notifier.publish(RideEvent::RideAccepted {
            ride_id: accepted.ride.id,
            driver_id,
            passenger_id: accepted.passenger.id,
        });
        Ok(accepted)
    }

    /// Decline a standing offer.
    pub fn reject(&self, driver_id: DriverId, offer_id: OfferId) -> Result<RideOffer, CoreError> {
        self.store
            .reject_offer(offer_id, driver_id, self.clock.now_ms())
    }
}
