/// Lifecycle of the tracker within one page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackingPhase {
    /// Guards passed, nothing sent yet.
    #[default]
    Booting,
    /// A registration call is in flight; no session token yet.
    Registering,
    /// Session token held; heartbeats flow.
    Active,
    /// Registration failed. Heartbeats and retraction stay silent for this session.
    Inert,
    /// Visitor opted out. Nothing is sent except retraction.
    OptedOut,
    /// Page is tearing down.
    Unloaded,
}

/// Requests a phase transition. These are requests; the graph decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseRequest {
    NewPageview,
    TokenAssigned,
    RegistrationFailed,
    OptOut,
    Unload,
}

pub struct PhaseGraph;

impl PhaseGraph {
    /// Pure function: (Current Phase, Request) -> New Phase.
    /// Returns None if the transition is invalid/ignored.
    pub fn transition(current: TrackingPhase, request: PhaseRequest) -> Option<TrackingPhase> {
        use PhaseRequest::*;
        use TrackingPhase::*;

        match (current, request) {
            (Booting | Registering | Active | Inert, NewPageview) => Some(Registering),

            (Registering, TokenAssigned) => Some(Active),
            (Registering, RegistrationFailed) => Some(Inert),

            (Booting | Registering | Active | Inert, OptOut) => Some(OptedOut),

            (Booting | Registering | Active | Inert | OptedOut, Unload) => Some(Unloaded),

            // Unloaded is terminal; OptedOut only leaves through Unload.
            _ => None,
        }
    }
}

impl TrackingPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackingPhase::Unloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_out_is_sticky() {
        let phase = PhaseGraph::transition(TrackingPhase::Active, PhaseRequest::OptOut).unwrap();
        assert_eq!(phase, TrackingPhase::OptedOut);
        assert_eq!(PhaseGraph::transition(phase, PhaseRequest::NewPageview), None);
        assert_eq!(PhaseGraph::transition(phase, PhaseRequest::TokenAssigned), None);
        assert_eq!(PhaseGraph::transition(phase, PhaseRequest::OptOut), None);
    }

    #[test]
    fn test_inert_session_can_start_a_new_pageview() {
        let phase = PhaseGraph::transition(TrackingPhase::Registering, PhaseRequest::RegistrationFailed).unwrap();
        assert_eq!(phase, TrackingPhase::Inert);
        assert_eq!(PhaseGraph::transition(phase, PhaseRequest::TokenAssigned), None);
        assert_eq!(PhaseGraph::transition(phase, PhaseRequest::NewPageview), Some(TrackingPhase::Registering));
    }

    #[test]
    fn test_unloaded_is_terminal() {
        for req in [
            PhaseRequest::NewPageview,
            PhaseRequest::TokenAssigned,
            PhaseRequest::RegistrationFailed,
            PhaseRequest::OptOut,
            PhaseRequest::Unload,
        ] {
            assert_eq!(PhaseGraph::transition(TrackingPhase::Unloaded, req), None);
        }
    }
}
