use super::navigation::Location;

/// Generation of a Visit Session. Bumped whenever a new registration is
/// issued so late responses for an earlier session can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionEpoch {
    pub generation: u64,
}

impl SessionEpoch {
    pub fn next(&self) -> Self {
        SessionEpoch { generation: self.generation + 1 }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Signals raised by the hosting page (DOM listeners, history hooks).
    Signal(PageSignal),
    /// Outcome of a registration call. `token` is `None` on any failure.
    Registered { epoch: SessionEpoch, token: Option<String> },
    /// Periodic heartbeat timer.
    HeartbeatTick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    /// Pointer movement, key press or scroll.
    Activity(ActivityKind),
    /// The URL may have changed without a reload.
    Navigated { source: NavigationSource, location: Location },
    DocumentReady,
    /// Explicit visitor opt-out.
    OptOut,
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PointerMove,
    KeyPress,
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationSource {
    PushState,
    ReplaceState,
    /// Browser back/forward.
    PopState,
    /// The tab became visible again; history may have moved while hidden.
    VisibilityRegained,
}

impl Event {
    pub fn activity(kind: ActivityKind) -> Self {
        Event::Signal(PageSignal::Activity(kind))
    }

    pub fn navigated(source: NavigationSource, href: &str) -> Self {
        Event::Signal(PageSignal::Navigated {
            source,
            location: Location::parse(href),
        })
    }
}
