//! Startup reconciliation
//!
//! In-memory timers die with the process; the store does not. On boot,
//! every ride still in SEARCHING gets its dispatch task rebuilt: a lapsed
//! phase deadline fires the phase end immediately (sweep, then advance or
//! fail), a future one is re-armed for the remaining interval. No ride is
//! ever left parked in SEARCHING.

use std::sync::Arc;

use tracing::info;

use types::errors::CoreError;

use crate::matcher::Dispatcher;

impl Dispatcher {
    /// Scan for SEARCHING rides and resume each one. Returns how many were
    /// picked up.
    pub fn recover_searching_rides(self: &Arc<Self>) -> Result<usize, CoreError> {
        let rides = self.store.list_searching_rides()?;
        let count = rides.len();
        for ride in &rides {
            info!(
                ride_id = %ride.id,
                phase = ride.phase,
                phase_expires_at = ?ride.phase_expires_at,
                "resuming ride found in SEARCHING"
            );
            self.resume(ride);
        }
        Ok(count)
    }
}
