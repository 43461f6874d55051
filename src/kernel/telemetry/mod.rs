//! Local tracker diagnostics.
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** contain visitor or site content (tokens,
//! paths, referrers, hostnames). Only epochs, counts, durations and enums.
//!
//! Telemetry is read-only with respect to tracking: nothing in the reactor
//! branches on it.

pub mod event;
pub mod metrics;
pub mod recorder;
