use std::collections::VecDeque;
use super::event::{HeartbeatKind, SkipReason, TelemetryEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub registration_stats: RegistrationStats,
    pub heartbeat_stats: HeartbeatStats,
    pub skipped_ticks: SkipStats,
    pub suppressed_navigations: u64,
    pub opt_outs: u64,
    pub retractions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationStats {
    pub issued: u64,
    pub accepted: u64,
    pub failed: u64,
    pub stale: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub periodic: u64,
    pub handovers: u64,
    pub unload_flushes: u64,
    pub max_dwell_seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipStats {
    pub opted_out: u64,
    pub no_session_token: u64,
    pub unloaded: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::RegistrationIssued { .. } => snap.registration_stats.issued += 1,
            TelemetryEvent::RegistrationSettled { accepted, .. } => {
                if *accepted {
                    snap.registration_stats.accepted += 1;
                } else {
                    snap.registration_stats.failed += 1;
                }
            }
            TelemetryEvent::StaleRegistration { .. } => snap.registration_stats.stale += 1,
            TelemetryEvent::HeartbeatQueued { dwell_seconds, kind, .. } => {
                match kind {
                    HeartbeatKind::Periodic => snap.heartbeat_stats.periodic += 1,
                    HeartbeatKind::Handover => snap.heartbeat_stats.handovers += 1,
                    HeartbeatKind::Unload => snap.heartbeat_stats.unload_flushes += 1,
                }
                snap.heartbeat_stats.max_dwell_seconds = snap.heartbeat_stats.max_dwell_seconds.max(*dwell_seconds);
            }
            TelemetryEvent::TickSkipped { reason } => match reason {
                SkipReason::OptedOut => snap.skipped_ticks.opted_out += 1,
                SkipReason::NoSessionToken => snap.skipped_ticks.no_session_token += 1,
                SkipReason::Unloaded => snap.skipped_ticks.unloaded += 1,
            },
            TelemetryEvent::NavigationSuppressed { .. } => snap.suppressed_navigations += 1,
            TelemetryEvent::OptedOut { retracted } => {
                snap.opt_outs += 1;
                if *retracted {
                    snap.retractions += 1;
                }
            }
            TelemetryEvent::LateRetraction { .. } => snap.retractions += 1,
        }
    }

    snap
}
