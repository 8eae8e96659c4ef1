//! Sustains a configurable number of concurrent HTTP sessions against one target.
//!
//! The work is split over a number of execution units (OS threads with their own
//! single threaded runtime). Each unit ramps up its share of sessions at a bounded
//! rate and every session keeps issuing requests until one of them fails.

pub mod client;
pub mod config;
pub mod distributor;
#[cfg(target_family = "unix")]
pub mod os;
pub mod pacing;
pub mod session;
pub mod spawner;
pub mod split;
pub mod statistics;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
