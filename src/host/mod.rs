//! The hosting page, as seen by the tracker.

pub mod embed;
pub mod page;

use crate::kernel::navigation::Location;
use std::collections::HashMap;

/// Stable id of the opt-out indicator. At most one element with this id
/// ever exists.
pub const INDICATOR_ID: &str = "modest-analytics-opt-out-indicator";

/// A `<script>` element: its `src` and its `data-*` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptElement {
    pub src: Option<String>,
    pub dataset: HashMap<String, String>,
}

impl ScriptElement {
    pub fn new(src: &str) -> Self {
        Self {
            src: Some(src.to_string()),
            dataset: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: &str) -> Self {
        self.dataset.insert(key.to_string(), value.to_string());
        self
    }

    /// `data-token`, or empty.
    pub fn token(&self) -> &str {
        self.dataset.get("token").map(String::as_str).unwrap_or_default()
    }
}

/// The persistent badge confirming opt-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorElement {
    pub id: String,
    pub text: String,
    pub title: String,
}

impl Default for IndicatorElement {
    fn default() -> Self {
        Self {
            id: INDICATOR_ID.to_string(),
            text: "Analytics off".to_string(),
            title: "You have opted out of Modest Analytics on this site.".to_string(),
        }
    }
}

/// DOM access the tracker needs. Implementations must never panic; a
/// missing capability is reported as absence.
pub trait Page: Send + Sync {
    fn location(&self) -> Location;

    /// `document.referrer`, empty when there is none.
    fn referrer(&self) -> String;

    /// The script currently executing, when the host can tell.
    fn current_script(&self) -> Option<ScriptElement>;

    /// All script elements in document order.
    fn scripts(&self) -> Vec<ScriptElement>;

    fn has_element(&self, id: &str) -> bool;

    fn append_element(&self, element: IndicatorElement);
}
