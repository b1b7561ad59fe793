//! # geoloc-engine
//!
//! TDOA multilateration core for low-power radio devices heard by three or
//! more fixed base stations. Because the transmit time is unknown, only
//! arrival-time *differences* carry information; each burst is flattened
//! into a local planar frame, solved by one of a family of estimators, and
//! mapped back to geographic coordinates.
//!
//! Data flow:
//!
//! ```text
//! GeoRow stream ─► driver ─► Transaction ─► ProjectedBurst ─► Algorithm
//!                                                                 │
//!        reported fix ◄─ aggregator ◄─ Estimate list ◄─ unproject ┘
//! ```
//!
//! The crate performs no I/O and holds no shared mutable state: every burst
//! owns its projection and receiver vector, so bursts can be solved
//! concurrently.

pub mod aggregator;
pub mod driver;
mod error;
mod linalg;
pub mod projection;
pub mod solver;
pub mod transaction;

pub use error::{GeolocationError, SolveFailure};
pub use solver::Algorithm;
