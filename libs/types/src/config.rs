//! Dispatch configuration
//!
//! Three phased offer waves with a radius and a TTL each, plus the bounded
//! read limits of the request surface. Defaults match the deployed values.

use crate::geo::EARTH_RADIUS_KM;
use crate::ride::RideStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of offer waves a ride goes through before failing.
pub const PHASE_COUNT: u8 = 3;

/// One offer wave: search radius and offer time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub radius_km: f64,
    pub ttl_seconds: u64,
}

impl PhaseConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn ttl_millis(&self) -> i64 {
        self.ttl_seconds as i64 * 1_000
    }
}

/// Dispatch core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub phase1: PhaseConfig,
    pub phase2: PhaseConfig,
    pub phase3: PhaseConfig,
    /// Upper bound on `driver.offersActive` reads.
    pub offers_active_read_limit: usize,
    /// Upper bound on ride history reads.
    pub rides_history_read_limit: usize,
    /// Status a freshly created ride starts in. SEARCHING starts dispatch
    /// immediately; OPEN leaves the ride parked until dispatch is begun
    /// explicitly.
    pub initial_status: RideStatus,
    /// Sphere radius handed to the geo distance.
    pub earth_radius_km: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            phase1: PhaseConfig {
                radius_km: 5.0,
                ttl_seconds: 15,
            },
            phase2: PhaseConfig {
                radius_km: 5.0,
                ttl_seconds: 7,
            },
            phase3: PhaseConfig {
                radius_km: 10.0,
                ttl_seconds: 12,
            },
            offers_active_read_limit: 20,
            rides_history_read_limit: 50,
            initial_status: RideStatus::Searching,
            earth_radius_km: EARTH_RADIUS_KM,
        }
    }
}

impl DispatchConfig {
    /// Config for phase `n` (1-based).
    ///
    /// # Panics
    /// Panics if `n` is not 1, 2, or 3.
    pub fn phase(&self, n: u8) -> &PhaseConfig {
        match n {
            1 => &self.phase1,
            2 => &self.phase2,
            3 => &self.phase3,
            other => panic!("phase {} out of range 1..={}", other, PHASE_COUNT),
        }
    }
}
