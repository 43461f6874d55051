use crate::error::{Result, TrackerError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Storage key holding the opt-out flag.
pub const OPT_OUT_KEY: &str = "modest-analytics-opt-out";

/// The only value that means "opted out".
pub const OPT_OUT_VALUE: &str = "true";

/// Origin-scoped key-value store that survives page loads (localStorage).
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    Tracking,
    OptedOut,
}

/// Reads and writes the opt-out flag. A store that cannot be read counts as
/// "not opted out"; a failed write is logged.
#[derive(Clone)]
pub struct ConsentGate {
    store: Arc<dyn PreferenceStore>,
    key: String,
}

impl ConsentGate {
    pub fn new(store: Arc<dyn PreferenceStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    pub fn state(&self) -> ConsentState {
        match self.store.get(&self.key) {
            Ok(Some(v)) if v == OPT_OUT_VALUE => ConsentState::OptedOut,
            Ok(_) => ConsentState::Tracking,
            Err(e) => {
                warn!("Opt-out flag unreadable, assuming tracking: {}", e);
                ConsentState::Tracking
            }
        }
    }

    pub fn is_opted_out(&self) -> bool {
        self.state() == ConsentState::OptedOut
    }

    pub fn persist_opt_out(&self) {
        if let Err(e) = self.store.set(&self.key, OPT_OUT_VALUE) {
            warn!("Failed to persist opt-out flag: {}", e);
        }
    }
}

/// In-process store, one per origin.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| TrackerError::Preferences {
            reason: "store lock poisoned".into(),
        })?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| TrackerError::Preferences {
            reason: "store lock poisoned".into(),
        })?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file shared by many origins; each origin sees only its own keys.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    origin: String,
    lock: Mutex<()>,
}

type OriginMap = HashMap<String, HashMap<String, String>>;

impl FilePreferenceStore {
    pub fn open(path: impl AsRef<Path>, origin: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            origin: origin.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<OriginMap> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(OriginMap::new()),
            Ok(text) => serde_json::from_str(&text).map_err(|e| TrackerError::Preferences {
                reason: format!("{}: {}", self.path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(OriginMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| TrackerError::Preferences {
            reason: "store lock poisoned".into(),
        })?;
        let map = self.load()?;
        Ok(map.get(&self.origin).and_then(|m| m.get(key)).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| TrackerError::Preferences {
            reason: "store lock poisoned".into(),
        })?;
        let mut map = self.load()?;
        map.entry(self.origin.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        let text = serde_json::to_string_pretty(&map).map_err(|e| TrackerError::Preferences {
            reason: e.to_string(),
        })?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}
