//! Turns a finished HTTP exchange into a value or a typed error.
//!
//! This is the only place that interprets Spotify status codes and error
//! payloads. Resource clients never look at raw responses.

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use crate::{
    Res,
    error::Error,
    spotify::scopes::{Feature, missing_scopes},
    types::Credential,
};

const REPEAT_PATH: &str = "me/player/repeat";
const PLAYER_PREFIX: &str = "me/player";
const PREMIUM_REQUIRED: &str = "PREMIUM_REQUIRED";
const NO_DEVICE_MESSAGES: [&str; 2] = ["device not found", "no active device"];

/// Maps one response to the caller-visible outcome.
///
/// - 2xx: `true` for an empty body (and always for `PUT /me/player/repeat`),
///   otherwise the parsed JSON.
/// - 403: `PremiumRequired`, or `MissingScopes` for scope complaints when a
///   feature is known.
/// - 404 under `/me/player`: `NoActiveDevice` for the device messages.
/// - Anything else: the provider's payload, passed through as a value.
pub fn classify_response(
    method: &Method,
    path: &str,
    status: StatusCode,
    body: &str,
    feature: Option<Feature>,
    credential: &Credential,
) -> Res<Value> {
    let path = normalize_path(path);

    if status.is_success() {
        return Ok(decode_success(method, path, body));
    }

    let payload = decode_error_payload(body);
    let detail = ErrorDetail::from_payload(&payload);

    match status {
        StatusCode::FORBIDDEN => {
            if detail.reason.as_deref() == Some(PREMIUM_REQUIRED) {
                return Err(Error::PremiumRequired(
                    detail.message.unwrap_or_else(|| PREMIUM_REQUIRED.to_string()),
                ));
            }
            if let Some(feature) = feature.filter(|_| detail.mentions("scope")) {
                let required = feature.required_scopes();
                let mut missing = missing_scopes(credential, required.iter().copied());
                if missing.is_empty() {
                    // Stored scopes claim everything; the provider disagrees.
                    missing = feature.required_scope_set();
                }
                if !missing.is_empty() {
                    return Err(Error::MissingScopes(missing));
                }
            }
        }
        StatusCode::NOT_FOUND if path.starts_with(PLAYER_PREFIX) => {
            if let Some(message) = detail.message.as_deref() {
                let lowered = message.to_ascii_lowercase();
                if NO_DEVICE_MESSAGES.iter().any(|m| lowered.contains(m)) {
                    return Err(Error::NoActiveDevice(message.to_string()));
                }
            }
        }
        _ => {}
    }

    tracing::debug!(path, status = status.as_u16(), "passing provider error through");
    Ok(payload)
}

/// Drops the query string and leading slashes: `/me/player?x=1` -> `me/player`.
fn normalize_path(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    path.trim_start_matches('/')
}

fn decode_success(method: &Method, path: &str, body: &str) -> Value {
    if *method == Method::PUT && path == REPEAT_PATH {
        return Value::Bool(true);
    }
    if body.trim().is_empty() {
        return Value::Bool(true);
    }
    serde_json::from_str(body).unwrap_or(Value::Bool(true))
}

fn decode_error_payload(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| json!({ "error": body }))
}

/// The fields of a Spotify error object we act on.
#[derive(Debug, Default)]
struct ErrorDetail {
    reason: Option<String>,
    message: Option<String>,
}

impl ErrorDetail {
    fn from_payload(payload: &Value) -> Self {
        let error = &payload["error"];
        let text = |v: &Value| v.as_str().map(String::from);
        match error {
            Value::Object(_) => Self {
                reason: text(&error["reason"]),
                message: text(&error["message"]),
            },
            // Accounts-style errors: {"error": "...", "error_description": "..."}
            Value::String(s) => Self {
                reason: None,
                message: text(&payload["error_description"]).or_else(|| Some(s.clone())),
            },
            _ => Self::default(),
        }
    }

    fn mentions(&self, needle: &str) -> bool {
        [&self.reason, &self.message]
            .into_iter()
            .flatten()
            .any(|s| s.to_ascii_lowercase().contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(scopes: &[&str]) -> Credential {
        Credential::new("a", "r", 0).with_scopes(scopes.iter().copied())
    }

    fn classify(status: u16, path: &str, body: &str, feature: Option<Feature>) -> Res<Value> {
        classify_response(
            &Method::GET,
            path,
            StatusCode::from_u16(status).unwrap(),
            body,
            feature,
            &cred(&["user-read-playback-state"]),
        )
    }

    #[test]
    fn test_success_bodies() {
        assert_eq!(classify(200, "/me", r#"{"ok":true}"#, None).unwrap(), json!({"ok": true}));
        assert_eq!(classify(204, "/me/player/play", "", None).unwrap(), json!(true));
        assert_eq!(classify(201, "/playlists", "not json", None).unwrap(), json!(true));
    }

    #[test]
    fn test_repeat_put_is_always_true() {
        let value = classify_response(
            &Method::PUT,
            "/me/player/repeat?state=track",
            StatusCode::OK,
            r#"{"unexpected":1}"#,
            Some(Feature::Playback),
            &cred(&[]),
        )
        .unwrap();
        assert_eq!(value, json!(true));
    }

    #[test]
    fn test_premium_required() {
        let body = r#"{"error":{"status":403,"message":"Player command failed: Premium required","reason":"PREMIUM_REQUIRED"}}"#;
        match classify(403, "/me/player/play", body, Some(Feature::Playback)) {
            Err(Error::PremiumRequired(message)) => assert!(message.contains("Premium")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_scope_complaint_with_feature() {
        let body = r#"{"error":{"status":403,"reason":"MISSING_SCOPE"}}"#;
        match classify(403, "/me/player/play", body, Some(Feature::Playback)) {
            Err(Error::MissingScopes(missing)) => {
                assert!(missing.contains("user-modify-playback-state"));
                assert!(!missing.contains("user-read-playback-state"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_scope_complaint_with_stale_metadata_reports_full_requirement() {
        let body = r#"{"error":{"status":403,"message":"Insufficient client scope"}}"#;
        let granted: Vec<&str> = Feature::Albums.required_scopes().to_vec();
        let result = classify_response(
            &Method::GET,
            "/me/albums",
            StatusCode::FORBIDDEN,
            body,
            Some(Feature::Albums),
            &cred(&granted),
        );
        match result {
            Err(Error::MissingScopes(missing)) => {
                assert_eq!(missing, Feature::Albums.required_scope_set())
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_scope_complaint_without_feature_passes_through() {
        let body = r#"{"error":{"status":403,"reason":"MISSING_SCOPE"}}"#;
        let value = classify(403, "/me/player/play", body, None).unwrap();
        assert_eq!(value["error"]["reason"], "MISSING_SCOPE");
    }

    #[test]
    fn test_other_forbidden_passes_through() {
        let body = r#"{"error":{"status":403,"message":"Restriction violated"}}"#;
        let value = classify(403, "/me/player/next", body, Some(Feature::Playback)).unwrap();
        assert_eq!(value["error"]["message"], "Restriction violated");
    }

    #[test]
    fn test_no_active_device_only_under_player() {
        let body = r#"{"error":{"status":404,"message":"No active device"}}"#;
        assert!(matches!(
            classify(404, "/me/player/play", body, None),
            Err(Error::NoActiveDevice(_))
        ));
        assert!(matches!(
            classify(404, "me/player", r#"{"error":{"message":"Device not found"}}"#, None),
            Err(Error::NoActiveDevice(_))
        ));
        assert_eq!(
            classify(404, "/albums/x", body, None).unwrap()["error"]["message"],
            "No active device"
        );
        assert_eq!(
            classify(404, "/me/player", r#"{"error":{"message":"Not found."}}"#, None).unwrap()
                ["error"]["message"],
            "Not found."
        );
    }

    #[test]
    fn test_non_json_error_is_wrapped() {
        let value = classify(502, "/me", "Bad Gateway", None).unwrap();
        assert_eq!(value, json!({"error": "Bad Gateway"}));
    }

    #[test]
    fn test_accounts_style_error_message() {
        let detail = ErrorDetail::from_payload(&json!({
            "error": "invalid_scope",
            "error_description": "Invalid scope"
        }));
        assert!(detail.mentions("scope"));
        assert_eq!(detail.message.as_deref(), Some("Invalid scope"));
    }
}
