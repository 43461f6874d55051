use super::{Page, ScriptElement};
use crate::config::TrackerConfig;
use reqwest::Url;

/// Why the tracker stayed silent. Never surfaced to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    NoEmbeddingElement,
    EmptyToken,
    EndpointUnset,
    /// Cadence settings the driver cannot run with.
    InvalidConfig,
    NoHostname,
}

/// Matches script URLs against the tracker's own URL: same scheme, host,
/// port and path. Any query string is accepted; a fragment is not.
#[derive(Debug, Clone)]
pub struct EmbedPattern {
    expected: Option<Url>,
}

impl EmbedPattern {
    pub fn new(script_src: &str) -> Self {
        Self { expected: Url::parse(script_src).ok() }
    }

    pub fn matches(&self, src: &str) -> bool {
        let (Some(expected), Ok(url)) = (&self.expected, Url::parse(src)) else {
            return false;
        };
        url.scheme() == expected.scheme()
            && url.host_str() == expected.host_str()
            && url.port_or_known_default() == expected.port_or_known_default()
            && url.path() == expected.path()
            && url.fragment().is_none()
    }
}

/// Find the element that loaded the tracker. Uses the current script when
/// available; otherwise scans newest-inserted first, since an async loader
/// appends its element last.
pub fn locate_embed(page: &dyn Page, pattern: &EmbedPattern) -> Option<ScriptElement> {
    if let Some(script) = page.current_script() {
        return Some(script);
    }
    page.scripts()
        .into_iter()
        .rev()
        .find(|s| s.src.as_deref().is_some_and(|src| pattern.matches(src)))
}

/// Guard checks that run before anything else. Returns the site token.
pub fn resolve_site_token(page: &dyn Page, config: &TrackerConfig) -> Result<String, DisabledReason> {
    let pattern = EmbedPattern::new(&config.script_src);
    let script = locate_embed(page, &pattern).ok_or(DisabledReason::NoEmbeddingElement)?;
    let token = script.token().trim();
    if token.is_empty() {
        return Err(DisabledReason::EmptyToken);
    }
    if !config.endpoints_configured() {
        return Err(DisabledReason::EndpointUnset);
    }
    Ok(token.to_string())
}
