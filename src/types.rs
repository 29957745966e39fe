use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::Tabled;

/// The unit of authentication state, persisted as the credential file.
///
/// An empty `refresh_token` means the credential cannot be renewed; it stays
/// usable until `expires_at` and then a new authorization flow is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, epoch seconds.
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scopes: BTreeSet<String>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            scopes: BTreeSet::new(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Builds a credential from a token endpoint response.
    ///
    /// `previous` supplies the refresh token and scopes when the provider
    /// does not send new ones.
    pub fn from_response(response: TokenResponse, now: i64, previous: Option<&Credential>) -> Self {
        let lifetime_secs = response.lifetime_secs();
        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous.map(|p| p.refresh_token.clone()))
            .unwrap_or_default();

        let scopes = match response.scope {
            Some(scope) if !scope.trim().is_empty() => parse_scope_list(&scope),
            _ => previous.map(|p| p.scopes.clone()).unwrap_or_default(),
        };

        Self {
            access_token: response.access_token,
            refresh_token,
            expires_at: now.saturating_add(lifetime_secs),
            scopes,
        }
    }
}

/// Splits a space separated scope string into a set.
pub fn parse_scope_list(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(String::from).collect()
}

/// Response body of the provider token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Longest access token lifetime taken at face value.
pub const MAX_EXPIRES_IN_SECS: i64 = 24 * 60 * 60;

fn default_expires_in() -> i64 {
    3600
}

impl TokenResponse {
    /// `expires_in` clamped to `0..=MAX_EXPIRES_IN_SECS`. A non-positive
    /// lifetime yields a token that is stale on arrival.
    pub fn lifetime_secs(&self) -> i64 {
        self.expires_in.clamp(0, MAX_EXPIRES_IN_SECS)
    }
}

/// Extra parts of an outbound API request beyond method and path.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Tabled)]
pub struct ScopeTableRow {
    pub feature: String,
    pub required: String,
    pub missing: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(refresh: Option<&str>, scope: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "new".into(),
            expires_in: 60,
            refresh_token: refresh.map(String::from),
            scope: scope.map(String::from),
        }
    }

    #[test]
    fn test_from_response_keeps_refresh_token_when_not_rotated() {
        let old = Credential::new("old", "r", 0).with_scopes(["a"]);
        let cred = Credential::from_response(response(None, None), 1000, Some(&old));
        assert_eq!(cred.access_token, "new");
        assert_eq!(cred.refresh_token, "r");
        assert_eq!(cred.expires_at, 1060);
        assert_eq!(cred.scopes, old.scopes);
    }

    #[test]
    fn test_from_response_rotates_refresh_token_and_scopes() {
        let old = Credential::new("old", "r", 0);
        let cred = Credential::from_response(response(Some("r2"), Some("a b")), 0, Some(&old));
        assert_eq!(cred.refresh_token, "r2");
        assert_eq!(cred.scopes, parse_scope_list("b a"));
    }

    #[test]
    fn test_from_response_without_previous_has_no_refresh_token() {
        let cred = Credential::from_response(response(None, None), 10, None);
        assert!(!cred.has_refresh_token());
        assert!(cred.scopes.is_empty());
    }

    #[test]
    fn test_from_response_clamps_lifetime() {
        let mut negative = response(None, None);
        negative.expires_in = -5;
        assert_eq!(Credential::from_response(negative, 1000, None).expires_at, 1000);

        let mut absurd = response(None, None);
        absurd.expires_in = i64::MAX;
        assert_eq!(
            Credential::from_response(absurd, 1000, None).expires_at,
            1000 + MAX_EXPIRES_IN_SECS
        );

        let mut late = response(None, None);
        late.expires_in = 3600;
        assert_eq!(Credential::from_response(late, i64::MAX, None).expires_at, i64::MAX);
    }

    #[test]
    fn test_token_response_defaults() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"a"}"#).unwrap();
        assert_eq!(parsed.expires_in, 3600);
        assert!(parsed.refresh_token.is_none());
    }
}
