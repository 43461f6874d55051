use reqwest::Url;

/// The parts of `window.location` the tracker cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub hostname: String,
    pub pathname: String,
    /// Query string including the leading `?`, or empty.
    pub search: String,
}

impl Location {
    /// Parse an absolute URL. Anything unparsable becomes a hostname-less
    /// location, which the tracker refuses to report.
    pub fn parse(href: &str) -> Self {
        let Ok(url) = Url::parse(href) else {
            return Self::default();
        };
        let search = match url.query() {
            Some(q) if !q.is_empty() => format!("?{}", q),
            _ => String::new(),
        };
        Self {
            hostname: url.host_str().unwrap_or_default().to_string(),
            pathname: url.path().to_string(),
            search,
        }
    }

    /// Path plus query, never the fragment.
    pub fn path_with_query(&self) -> String {
        let path = if self.pathname.is_empty() { "/" } else { self.pathname.as_str() };
        format!("{}{}", path, self.search)
    }

    pub fn key(&self) -> NavigationKey {
        NavigationKey {
            domain: self.hostname.clone(),
            path: self.path_with_query(),
        }
    }
}

/// Identity of an emitted pageview; two signals with the same key in a row
/// produce a single registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavigationKey {
    pub domain: String,
    pub path: String,
}
