use crate::error::{Result, TrackerError};
use crate::kernel::consent::OPT_OUT_KEY;
use crate::kernel::time::{ACTIVITY_WINDOW_MS, HEARTBEAT_MS};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Tracker settings. Every field has a production default; `from_env`
/// overrides individual fields from `MODEST_*` variables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    pub pageview_endpoint: String,
    pub heartbeat_endpoint: String,
    pub delete_endpoint: String,
    /// URL the embedding `<script>` loads the tracker from (any query allowed).
    pub script_src: String,
    pub heartbeat_interval_ms: u64,
    pub activity_window_ms: u64,
    /// How long unload waits for in-flight deliveries.
    pub unload_grace_ms: u64,
    pub request_timeout_ms: u64,
    pub opt_out_key: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pageview_endpoint: "https://modestanalytics.com/pageview".to_string(),
            heartbeat_endpoint: "https://modestanalytics.com/heartbeat".to_string(),
            delete_endpoint: "https://modestanalytics.com/delete".to_string(),
            script_src: "https://modestanalytics.com/embed.js".to_string(),
            heartbeat_interval_ms: HEARTBEAT_MS,
            activity_window_ms: ACTIVITY_WINDOW_MS,
            unload_grace_ms: 1_500,
            request_timeout_ms: 5_000,
            opt_out_key: OPT_OUT_KEY.to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| TrackerError::Config { reason: e.to_string() })
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = env::var("MODEST_PAGEVIEW_ENDPOINT") {
            config.pageview_endpoint = v;
        }
        if let Ok(v) = env::var("MODEST_HEARTBEAT_ENDPOINT") {
            config.heartbeat_endpoint = v;
        }
        if let Ok(v) = env::var("MODEST_DELETE_ENDPOINT") {
            config.delete_endpoint = v;
        }
        if let Ok(v) = env::var("MODEST_SCRIPT_SRC") {
            config.script_src = v;
        }
        if let Some(ms) = env_millis("MODEST_HEARTBEAT_INTERVAL_MS")? {
            config.heartbeat_interval_ms = ms;
        }
        if let Some(ms) = env_millis("MODEST_ACTIVITY_WINDOW_MS")? {
            config.activity_window_ms = ms;
        }
        if let Some(ms) = env_millis("MODEST_UNLOAD_GRACE_MS")? {
            config.unload_grace_ms = ms;
        }
        if let Some(ms) = env_millis("MODEST_REQUEST_TIMEOUT_MS")? {
            config.request_timeout_ms = ms;
        }

        Ok(config)
    }

    /// All three collector endpoints are set.
    pub fn endpoints_configured(&self) -> bool {
        !self.pageview_endpoint.trim().is_empty()
            && !self.heartbeat_endpoint.trim().is_empty()
            && !self.delete_endpoint.trim().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.endpoints_configured() {
            return Err(TrackerError::Config { reason: "collector endpoint unset".into() });
        }
        if self.heartbeat_interval_ms < 1_000 {
            return Err(TrackerError::Config { reason: "heartbeat interval below one second".into() });
        }
        // Each tick credits the interval in whole seconds
        if self.heartbeat_interval_ms % 1_000 != 0 {
            return Err(TrackerError::Config {
                reason: "heartbeat interval must be a whole number of seconds".into(),
            });
        }
        if self.activity_window_ms <= self.heartbeat_interval_ms {
            return Err(TrackerError::Config {
                reason: "activity window must be wider than the heartbeat interval".into(),
            });
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn activity_window(&self) -> Duration {
        Duration::from_millis(self.activity_window_ms)
    }

    pub fn unload_grace(&self) -> Duration {
        Duration::from_millis(self.unload_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn env_millis(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| TrackerError::Config { reason: format!("{}: {}", name, e) }),
        Err(_) => Ok(None),
    }
}
