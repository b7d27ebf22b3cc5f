//! Dispatch core
//!
//! Drives a ride request from creation to a winner or a terminal failure:
//!
//! ```text
//! ride.create
//!     │
//! ┌───▼────────┐   phase 1..3: sweep → persist phase → candidates → offers
//! │ Dispatcher │──────────────────────────────┐
//! └───┬────────┘                              │
//!     │ zero offers: skip ahead               ▼
//!     │ offers out: arm phase-end timer   RideOffer (SENT, expires_at)
//!     │ exhausted: ride FAILED                │
//!     ▼                                       ▼
//! Store ◄──────────────── accept_offer_atomic (single winner)
//! ```
//!
//! The store is the only shared mutable resource; every timer handle kept
//! here is an advisory cache that crash recovery can rebuild.

pub mod clock;
pub mod matcher;
pub mod notify;
pub mod offers;
pub mod recovery;
pub mod registry;
pub mod rides;

pub use clock::Clock;
pub use matcher::Dispatcher;
pub use notify::{Notifier, RideEvent, TracingNotifier};
pub use offers::OfferService;
pub use registry::{AvailabilityUpdate, DriverRegistry};
pub use rides::{RideDraft, RideService};
