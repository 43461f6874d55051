use crate::error::{Result, TrackerError};
use serde::Deserialize;

/// Browsers refuse beacon payloads above this size.
pub const MAX_BEACON_BYTES: usize = 64 * 1024;

/// A form-encoded request body, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormBody(pub Vec<(&'static str, String)>);

impl FormBody {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| *k == field).map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|(k, _)| *k).collect()
    }

    /// Upper bound on the urlencoded size (every byte percent-escaped).
    pub fn encoded_len_bound(&self) -> usize {
        self.0
            .iter()
            .map(|(k, v)| k.len() + 1 + v.len() * 3)
            .sum::<usize>()
            + self.0.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Site token from the embedding element.
    pub token: String,
    pub domain: String,
    pub path: String,
    pub referrer: String,
}

impl RegisterRequest {
    pub fn form(&self) -> FormBody {
        FormBody(vec![
            ("token", self.token.clone()),
            ("domain", self.domain.clone()),
            ("path", self.path.clone()),
            ("referrer", self.referrer.clone()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    /// Session token, never the site token.
    pub token: String,
    /// Cumulative, the collector overwrites.
    pub time_spent_on_page: u64,
}

impl HeartbeatRequest {
    pub fn form(&self) -> FormBody {
        FormBody(vec![
            ("token", self.token.clone()),
            ("time_spent_on_page", self.time_spent_on_page.to_string()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetractRequest {
    pub token: String,
}

impl RetractRequest {
    pub fn form(&self) -> FormBody {
        FormBody(vec![("token", self.token.clone())])
    }
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Extract the session token from a Pageview Endpoint response. Anything
/// other than a JSON object with a non-empty string `token` is malformed.
pub fn decode_session_token(body: &str) -> Result<String> {
    let resp: RegisterResponse = serde_json::from_str(body)
        .map_err(|e| TrackerError::MalformedResponse { reason: e.to_string() })?;
    match resp.token {
        Some(token) if !token.is_empty() => Ok(token),
        Some(_) => Err(TrackerError::MalformedResponse { reason: "empty token".into() }),
        None => Err(TrackerError::MalformedResponse { reason: "no token field".into() }),
    }
}

pub fn parse_session_token(body: &str) -> Option<String> {
    decode_session_token(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_token() {
        assert_eq!(parse_session_token(r#"{"token":"sess-1"}"#).as_deref(), Some("sess-1"));
        assert_eq!(parse_session_token(r#"{"token":""}"#), None);
        assert_eq!(parse_session_token(r#"{"detail":"Unknown token."}"#), None);
        assert_eq!(parse_session_token(r#"{"token":42}"#), None);
        assert_eq!(parse_session_token("<html>502</html>"), None);
        assert_eq!(parse_session_token(""), None);
    }

    #[test]
    fn test_decode_reports_why() {
        let err = decode_session_token(r#"{"token":""}"#).unwrap_err();
        assert!(err.to_string().contains("empty token"));
        assert!(matches!(decode_session_token("nope"), Err(TrackerError::MalformedResponse { .. })));
    }

    #[test]
    fn test_register_form_field_order() {
        let req = RegisterRequest {
            token: "abc".into(),
            domain: "example.com".into(),
            path: "/blog?x=1".into(),
            referrer: String::new(),
        };
        let form = req.form();
        assert_eq!(form.fields(), vec!["token", "domain", "path", "referrer"]);
        assert_eq!(form.get("referrer"), Some(""));
    }

    #[test]
    fn test_encoded_len_bound_covers_escaping() {
        let form = FormBody(vec![("a", "é&".into())]);
        // "a=%C3%A9%26" is 11 bytes
        assert!(form.encoded_len_bound() >= 11);
    }
}
