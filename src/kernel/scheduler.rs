use super::event::SessionEpoch;
use super::state::{StateDelta, VisitSession};
use super::time::Millis;
use crate::services::collector::wire::{HeartbeatRequest, RegisterRequest, RetractRequest};
use std::time::Duration;

/// Work the driver performs on behalf of the kernel. The kernel never does
/// I/O itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Register { epoch: SessionEpoch, request: RegisterRequest },
    Heartbeat(HeartbeatRequest),
    Retract(RetractRequest),
    InstallIndicator,
}

/// Dwell accounting policy.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    pub interval: Duration,
    pub activity_window: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, activity_window: Duration) -> Self {
        Self { interval, activity_window }
    }

    pub fn is_active(&self, session: &VisitSession, now: Millis) -> bool {
        now.since(session.last_activity) <= self.activity_window
    }

    /// Periodic tick: a fixed increment when active, never the wall-clock
    /// delta, so a throttled background timer cannot overcount.
    pub fn accrue_tick(&self, session: &VisitSession, now: Millis) -> StateDelta {
        if self.is_active(session, now) {
            StateDelta::DwellAccrued { seconds: self.interval.as_secs(), at: now }
        } else {
            StateDelta::TickObserved(now)
        }
    }

    /// Final accrual before a session ends: whole seconds since the last
    /// accrual point, capped at one interval.
    pub fn accrue_partial(&self, session: &VisitSession, now: Millis) -> Option<StateDelta> {
        if !self.is_active(session, now) {
            return None;
        }
        let seconds = now.since(session.last_tick_at).min(self.interval).as_secs();
        (seconds > 0).then_some(StateDelta::DwellAccrued { seconds, at: now })
    }

    /// Projection of the current cumulative dwell. Reads the session at call
    /// time, after any accrual has been reduced.
    pub fn heartbeat(&self, session: &VisitSession) -> Option<SideEffect> {
        let token = session.session_token()?;
        Some(SideEffect::Heartbeat(HeartbeatRequest {
            token: token.to_string(),
            time_spent_on_page: session.dwell_seconds(),
        }))
    }

    pub fn registration(&self, session: &VisitSession) -> SideEffect {
        SideEffect::Register {
            epoch: session.epoch,
            request: RegisterRequest {
                token: session.user_token.clone(),
                domain: session.domain.clone(),
                path: session.current_path.clone(),
                referrer: session.initial_referrer.clone(),
            },
        }
    }
}
