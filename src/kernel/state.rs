use super::event::SessionEpoch;
use super::navigation::{Location, NavigationKey};
use super::presence::{PhaseGraph, PhaseRequest, TrackingPhase};
use super::time::Millis;
use tracing::debug;

/// Strict state delta. This is the ONLY way the session mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateDelta {
    ActivityObserved(Millis),
    /// A new Visit Session begins for `key`.
    PageviewIssued { epoch: SessionEpoch, key: NavigationKey, at: Millis },
    TokenAssigned(String),
    RegistrationFailed,
    DwellAccrued { seconds: u64, at: Millis },
    /// Accrual point moved without crediting time (inactive tick).
    TickObserved(Millis),
    OptedOut,
    /// The session token was handed to a retraction call.
    TokenRetracted,
    Unloaded,
}

/// One tracked exposure of a page, from registration to navigation or unload.
#[derive(Debug, Clone)]
pub struct VisitSession {
    pub user_token: String,
    pub domain: String,
    pub initial_referrer: String,
    pub current_path: String,
    session_token: Option<String>,
    pub start_time: Millis,
    dwell_seconds: u64,
    pub last_activity: Millis,
    pub last_tick_at: Millis,
    pub epoch: SessionEpoch,
    pub last_sent: Option<NavigationKey>,
    pub phase: TrackingPhase,
    // Monotonic version, bumped on every reduction
    pub version: u64,
}

impl VisitSession {
    pub fn new(user_token: String, location: &Location, referrer: String, now: Millis) -> Self {
        Self {
            user_token,
            domain: location.hostname.clone(),
            initial_referrer: referrer,
            current_path: location.path_with_query(),
            session_token: None,
            start_time: now,
            dwell_seconds: 0,
            last_activity: now,
            last_tick_at: now,
            epoch: SessionEpoch::default(),
            last_sent: None,
            phase: TrackingPhase::Booting,
            version: 0,
        }
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn dwell_seconds(&self) -> u64 {
        self.dwell_seconds
    }

    pub fn is_opted_out(&self) -> bool {
        self.phase == TrackingPhase::OptedOut
    }

    fn advance(&mut self, request: PhaseRequest) -> bool {
        match PhaseGraph::transition(self.phase, request) {
            Some(next) => {
                debug!("phase {:?} -> {:?}", self.phase, next);
                self.phase = next;
                true
            }
            None => false,
        }
    }

    /// Pure reduction: State + Delta -> Mutated State
    pub fn reduce(&mut self, delta: StateDelta) {
        self.version += 1;

        match delta {
            StateDelta::ActivityObserved(at) => {
                self.last_activity = self.last_activity.max(at);
            }
            StateDelta::PageviewIssued { epoch, key, at } => {
                if self.advance(PhaseRequest::NewPageview) {
                    self.epoch = epoch;
                    self.domain = key.domain.clone();
                    self.current_path = key.path.clone();
                    self.last_sent = Some(key);
                    self.session_token = None;
                    self.start_time = at;
                    self.last_tick_at = at;
                    self.last_activity = self.last_activity.max(at);
                    self.dwell_seconds = 0;
                }
            }
            StateDelta::TokenAssigned(token) => {
                if self.advance(PhaseRequest::TokenAssigned) {
                    self.session_token = Some(token);
                }
            }
            StateDelta::RegistrationFailed => {
                self.advance(PhaseRequest::RegistrationFailed);
            }
            StateDelta::DwellAccrued { seconds, at } => {
                if self.phase == TrackingPhase::Active {
                    self.dwell_seconds = self.dwell_seconds.saturating_add(seconds);
                    self.last_tick_at = self.last_tick_at.max(at);
                }
            }
            StateDelta::TickObserved(at) => {
                self.last_tick_at = self.last_tick_at.max(at);
            }
            StateDelta::OptedOut => {
                self.advance(PhaseRequest::OptOut);
            }
            StateDelta::TokenRetracted => {
                self.session_token = None;
            }
            StateDelta::Unloaded => {
                self.advance(PhaseRequest::Unload);
            }
        }
    }
}
