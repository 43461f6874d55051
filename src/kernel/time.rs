use std::time::Duration;

/// Default heartbeat cadence.
pub const HEARTBEAT_MS: u64 = 4_000;

/// Input older than this no longer counts the page as "active".
pub const ACTIVITY_WINDOW_MS: u64 = 30_000;

/// Milliseconds since the tracker booted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    pub fn from_secs(secs: u64) -> Self {
        Millis(secs * 1_000)
    }

    /// Elapsed time from `earlier` to `self`. Saturates to zero when the
    /// clock appears to run backwards.
    pub fn since(&self, earlier: Millis) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

/// Monotonic clock anchored at tracker boot. Backed by tokio's clock so a
/// paused runtime drives it deterministically.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: tokio::time::Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self { origin: tokio::time::Instant::now() }
    }

    pub fn now(&self) -> Millis {
        Millis(self.origin.elapsed().as_millis() as u64)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}
