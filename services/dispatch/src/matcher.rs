//! Phase controller
//!
//! Per-ride state machine that issues the three offer waves. Each ride gets
//! its own task walking `Begin(phase)` / `AwaitEnd(phase)` steps:
//!
//! - **Begin**: sweep lapsed offers, re-read the ride, persist the live
//!   phase, select candidates, emit offers. Zero offers skips straight to
//!   the next phase; after the last phase the ride fails.
//! - **AwaitEnd**: sleep to the phase deadline, sweep, re-read; advance or
//!   fail.
//!
//! A winner, a cancellation, or a failure is always observed through the
//! store on the next step, so timers never need to be torn down for
//! correctness.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use store::{CandidateFilter, Store};
use types::config::PHASE_COUNT;
use types::geo::distance_km_with_radius;
use types::prelude::*;

use crate::clock::Clock;
use crate::notify::{Notifier, RideEvent};

/// Where a ride's dispatch task continues next.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Entry {
    /// Start phase `n`: sweep, persist, emit offers.
    Begin(u8),
    /// Offers for phase `n` are out; wake at the deadline (Unix millis).
    AwaitEnd(u8, i64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Flow {
    Next(Entry),
    Done,
}

/// Per-ride dispatch coordinator.
pub struct Dispatcher {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) clock: Clock,
    notifier: Arc<dyn Notifier>,
    config: DispatchConfig,
    /// Advisory cache of live tasks; loss is reconciled from the store.
    tasks: DashMap<RideId, JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        config: DispatchConfig,
        clock: Clock,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            clock,
            notifier,
            config,
            tasks: DashMap::new(),
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Kick off the phase sequence for a freshly created ride.
    pub fn begin_dispatch(self: &Arc<Self>, ride_id: RideId) {
        self.spawn(ride_id, Entry::Begin(1));
    }

    /// Re-arm a ride found in SEARCHING at startup. An already-lapsed
    /// deadline fires the phase end immediately.
    pub fn resume(self: &Arc<Self>, ride: &RideRequest) {
        let deadline = ride.phase_expires_at.unwrap_or_else(|| self.clock.now_ms());
        self.spawn(ride.id, Entry::AwaitEnd(ride.phase, deadline));
    }

    /// Drop and abort a ride's task if one is live. Purely an optimization:
    /// an aborted or lost task is equivalent to one that wakes and observes
    /// a terminal ride.
    pub fn abort_task(&self, ride_id: RideId) {
        if let Some((_, handle)) = self.tasks.remove(&ride_id) {
            handle.abort();
        }
    }

    /// Number of live dispatch tasks (advisory).
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn spawn(self: &Arc<Self>, ride_id: RideId, entry: Entry) {
        let dispatcher = Arc::clone(self);
        let handle = tokio::spawn(async move { dispatcher.run(ride_id, entry).await });
        if let Some(previous) = self.tasks.insert(ride_id, handle) {
            previous.abort();
        }
    }

    async fn run(self: Arc<Self>, ride_id: RideId, start: Entry) {
        let mut entry = start;
        loop {
            let step = match entry {
                Entry::Begin(phase) => self.begin_phase(ride_id, phase),
                Entry::AwaitEnd(phase, deadline) => {
                    self.sleep_until(deadline).await;
                    self.end_phase(ride_id, phase)
                }
            };
            entry = match step {
                Ok(Flow::Next(next)) => next,
                Ok(Flow::Done) => break,
                Err(err) => {
                    // A store fault inside one step counts as "no winner
                    // this phase": advance or fail, never park in SEARCHING.
                    let phase = match entry {
                        Entry::Begin(p) | Entry::AwaitEnd(p, _) => p,
                    };
                    error!(ride_id = %ride_id, phase, error = %err, "dispatch step failed");
                    match self.salvage(ride_id, phase) {
                        Some(next) => next,
                        None => break,
                    }
                }
            };
        }
        self.tasks.remove(&ride_id);
    }

    /// Sweep → reload → persist phase → candidates → offers.
    fn begin_phase(&self, ride_id: RideId, phase: u8) -> Result<Flow, CoreError> {
        let now = self.clock.now_ms();
        self.store.expire_sent_offers(ride_id, now)?;

        let Some(ride) = self.store.get_ride(ride_id)? else {
            return Ok(Flow::Done);
        };
        if !ride.is_dispatchable() {
            return Ok(Flow::Done);
        }

        let phase_cfg = *self.config.phase(phase);
        let expires_at = now + phase_cfg.ttl_millis();
        let ride = match self
            .store
            .update_ride_phase(ride_id, phase, phase_cfg.radius_km, expires_at, now)
        {
            Ok(ride) => ride,
            // A winner or a cancellation landed between the read above and
            // this write; nothing left to do.
            Err(CoreError::Conflict(_)) => return Ok(Flow::Done),
            Err(err) => return Err(err),
        };

        let candidates = self.candidates(&ride, &phase_cfg)?;
        let records: Vec<NewOffer> = candidates
            .iter()
            .map(|driver| NewOffer {
                ride_request_id: ride_id,
                driver_id: driver.id,
                sent_at: now,
                expires_at,
            })
            .collect();
        let created = self.store.create_offers_skip_duplicates(&records)?;
        info!(
            ride_id = %ride_id,
            phase,
            radius_km = phase_cfg.radius_km,
            candidates = candidates.len(),
            created,
            "offer wave emitted"
        );

        if created == 0 {
            if phase < PHASE_COUNT {
                // Nobody new to ask; skip ahead without sleeping.
                return Ok(Flow::Next(Entry::Begin(phase + 1)));
            }
            self.fail(ride_id)?;
            return Ok(Flow::Done);
        }

        self.notifier.publish(RideEvent::OffersSent {
            ride_id,
            phase,
            count: created,
        });
        Ok(Flow::Next(Entry::AwaitEnd(phase, expires_at)))
    }

    /// Phase deadline reached: sweep, re-read, advance or fail.
    fn end_phase(&self, ride_id: RideId, phase: u8) -> Result<Flow, CoreError> {
        let now = self.clock.now_ms();
        self.store.expire_sent_offers(ride_id, now)?;

        let Some(ride) = self.store.get_ride(ride_id)? else {
            return Ok(Flow::Done);
        };
        if !ride.is_dispatchable() {
            return Ok(Flow::Done);
        }
        if phase < PHASE_COUNT {
            return Ok(Flow::Next(Entry::Begin(phase + 1)));
        }
        self.fail(ride_id)?;
        Ok(Flow::Done)
    }

    /// ONLINE drivers, radius-filtered around the pickup when the ride has
    /// one. A ride without pickup coordinates takes every ONLINE driver,
    /// located or not.
    fn candidates(
        &self,
        ride: &RideRequest,
        phase_cfg: &PhaseConfig,
    ) -> Result<Vec<Driver>, CoreError> {
        let Some(pickup) = ride.pickup.coords else {
            return self.store.list_candidate_drivers(&CandidateFilter::all_online());
        };
        let fetched = self
            .store
            .list_candidate_drivers(&CandidateFilter::within(pickup, phase_cfg.radius_km))?;
        let mut out = Vec::with_capacity(fetched.len());
        for driver in fetched {
            let Some(location) = driver.location else {
                continue;
            };
            match distance_km_with_radius(location, pickup, self.config.earth_radius_km) {
                Ok(distance) if distance <= phase_cfg.radius_km => out.push(driver),
                Ok(_) => {}
                Err(err) => {
                    warn!(driver_id = %driver.id, error = %err, "skipping driver with bad location")
                }
            }
        }
        Ok(out)
    }

    /// Conditional FAILED write: a winner that slipped in keeps the ride.
    fn fail(&self, ride_id: RideId) -> Result<(), CoreError> {
        if self.store.fail_ride_if_searching(ride_id, self.clock.now_ms())? {
            info!(ride_id = %ride_id, "no driver found, ride failed");
            self.notifier.publish(RideEvent::RideFailed { ride_id });
        }
        Ok(())
    }

    /// Continuation after a failed step: next phase if one is left,
    /// otherwise a best-effort FAILED write.
    fn salvage(&self, ride_id: RideId, phase: u8) -> Option<Entry> {
        if phase < PHASE_COUNT {
            return Some(Entry::Begin(phase + 1));
        }
        if let Err(err) = self.fail(ride_id) {
            error!(ride_id = %ride_id, error = %err, "failed to mark ride FAILED");
        }
        None
    }

    async fn sleep_until(&self, deadline_ms: i64) {
        let now = self.clock.now_ms();
        if deadline_ms > now {
            tokio::time::sleep(std::time::Duration::from_millis((deadline_ms - now) as u64)).await;
        }
    }
}
