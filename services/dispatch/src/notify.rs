//! Outbound notification sink
//!
//! Notifications are fire-and-forget: dispatch publishes an event and moves
//! on, and delivery failures never propagate back into ride handling.

use tracing::info;
use types::prelude::*;

/// Events the dispatch core announces.
#[derive(Debug, Clone, PartialEq)]
pub enum RideEvent {
    OffersSent {
        ride_id: RideId,
        phase: u8,
        count: usize,
    },
    RideAccepted {
        ride_id: RideId,
        driver_id: DriverId,
        passenger_id: PassengerId,
    },
    RideFailed {
        ride_id: RideId,
    },
    RideCanceled {
        ride_id: RideId,
    },
}

/// Fire-and-forget event sink.
pub trait Notifier: Send + Sync {
    fn publish(&self, event: RideEvent);
}

/// Default sink: structured log lines. Stands in for the push/SMS channels
/// a deployment wires up.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn publish(&self, event: RideEvent) {
        match event {
            RideEvent::OffersSent {
                ride_id,
                phase,
                count,
            } => info!(ride_id = %ride_id, phase, count, "offers sent"),
            RideEvent::RideAccepted {
                ride_id,
                driver_id,
                passenger_id,
            } => info!(ride_id = %ride_id, driver_id = %driver_id, passenger_id = %passenger_id, "ride accepted"),
            RideEvent::RideFailed { ride_id } => info!(ride_id = %ride_id, "ride failed"),
            RideEvent::RideCanceled { ride_id } => info!(ride_id = %ride_id, "ride canceled"),
        }
    }
}
