use crate::kernel::event::{NavigationSource, SessionEpoch};
use crate::kernel::time::Millis;

// Allowed: epochs, timestamps, durations, counts, enums
// Forbidden: tokens, paths, referrers, hostnames

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    RegistrationIssued {
        epoch: SessionEpoch,
        at: Millis,
    },

    RegistrationSettled {
        epoch: SessionEpoch,
        accepted: bool,
    },

    /// A registration result for a session that is no longer current.
    StaleRegistration {
        epoch: SessionEpoch,
        current: SessionEpoch,
    },

    HeartbeatQueued {
        epoch: SessionEpoch,
        dwell_seconds: u64,
        kind: HeartbeatKind,
    },

    TickSkipped {
        reason: SkipReason,
    },

    NavigationSuppressed {
        source: NavigationSource,
    },

    OptedOut {
        retracted: bool,
    },

    /// A token that arrived after opt-out was retracted on arrival.
    LateRetraction {
        epoch: SessionEpoch,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatKind {
    Periodic,
    /// Last report of a session ended by navigation.
    Handover,
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OptedOut,
    NoSessionToken,
    Unloaded,
}
