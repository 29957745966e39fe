//! Configuration management for spotmcp.
//!
//! Configuration comes from environment variables, optionally seeded from a
//! `.env` file in the per-user configuration directory. The lookup order is:
//! 1. Environment variables (highest priority)
//! 2. `.env` file at `<config dir>/spotmcp/.env`
//! 3. Built-in defaults for everything except the client id
//!
//! The individual getters read the environment on every call. [`Settings`]
//! snapshots them once so the rest of the crate never touches `std::env`.

use std::{env, path::PathBuf, time::Duration};

use reqwest::Url;

use crate::{Res, error::Error};

pub const APP_NAME: &str = "spotmcp";

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8000/auth/callback";
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 120;

/// Scopes requested by a fresh authorization when `SPOTIFY_API_AUTH_SCOPE` is unset.
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
    "user-read-playback-position",
    "user-top-read",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-private",
    "playlist-modify-public",
    "user-library-read",
    "user-library-modify",
];

/// Returns the per-user directory holding the `.env` file and default token file.
///
/// - Linux: `~/.config/spotmcp`
/// - macOS: `~/Library/Application Support/spotmcp`
/// - Windows: `%APPDATA%/spotmcp`
pub fn app_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_NAME);
    path
}

/// Loads environment variables from `<config dir>/spotmcp/.env`.
///
/// Variables already present in the process environment win over the file.
///
/// # Returns
///
/// Returns `Ok(())` when the file was loaded or does not exist.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file exists but cannot be read or parsed.
///
/// # Example
///
/// ```
/// use spotmcp::config;
///
/// #[tokio::main]
/// async fn main() {
///     if let Err(e) = config::load_env().await {
///         eprintln!("Configuration error: {}", e);
///     }
/// }
/// ```
pub async fn load_env() -> Res<()> {
    let path = app_dir().join(".env");
    if !async_fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
        return Ok(());
    }

    dotenv::from_path(&path)
        .map_err(|e| Error::Config(format!("cannot load {}: {}", path.display(), e)))
}

/// Returns the Spotify application client id.
///
/// Reads `SPOTIFY_API_AUTH_CLIENT_ID`. Blank values count as unset.
///
/// # Returns
///
/// `None` when the variable is missing, which [`Settings::from_env`] turns
/// into a configuration error.
///
/// # Example
///
/// ```
/// let id = spotify_client_id(); // e.g., Some("0f3c...")
/// ```
pub fn spotify_client_id() -> Option<String> {
    non_empty_var("SPOTIFY_API_AUTH_CLIENT_ID")
}

/// Returns the Spotify application client secret.
///
/// Reads `SPOTIFY_API_AUTH_CLIENT_SECRET`. When unset the authorization flow
/// runs as a public client with PKCE, and the client credentials grant is
/// unavailable.
///
/// # Example
///
/// ```
/// let secret = spotify_client_secret(); // None for a public client
/// ```
pub fn spotify_client_secret() -> Option<String> {
    non_empty_var("SPOTIFY_API_AUTH_CLIENT_SECRET")
}

/// Returns the OAuth redirect URI.
///
/// Reads `SPOTIFY_API_REDIRECT_URI`, falling back to
/// [`DEFAULT_REDIRECT_URI`]. The loopback listener binds to its host and
/// port and serves the callback on its path.
///
/// # Example
///
/// ```
/// let uri = spotify_redirect_uri(); // e.g., "http://127.0.0.1:8000/auth/callback"
/// ```
pub fn spotify_redirect_uri() -> String {
    non_empty_var("SPOTIFY_API_REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
}

/// Returns the scopes requested by a fresh authorization.
///
/// Reads the space separated `SPOTIFY_API_AUTH_SCOPE`, falling back to
/// [`DEFAULT_SCOPES`].
///
/// # Example
///
/// ```
/// let scopes = spotify_scope(); // e.g., ["user-read-playback-state", ...]
/// ```
pub fn spotify_scope() -> Vec<String> {
    match non_empty_var("SPOTIFY_API_AUTH_SCOPE") {
        Some(raw) => raw.split_whitespace().map(String::from).collect(),
        None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Spotify authorization endpoint (`SPOTIFY_API_AUTH_URL`).
pub fn spotify_apiauth_url() -> String {
    non_empty_var("SPOTIFY_API_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string())
}

/// Spotify token endpoint (`SPOTIFY_API_TOKEN_URL`).
pub fn spotify_apitoken_url() -> String {
    non_empty_var("SPOTIFY_API_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string())
}

/// Spotify Web API base (`SPOTIFY_API_URL`).
pub fn spotify_apiurl() -> String {
    non_empty_var("SPOTIFY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

/// Returns the credential file location.
///
/// Uses `SPOTIFY_TOKENS_PATH` if set, expanding a leading `~/`. Otherwise
/// the file lives at `<config dir>/spotmcp/tokens.json`.
///
/// # Example
///
/// ```
/// let path = tokens_path(); // e.g., "/home/me/.config/spotmcp/tokens.json"
/// ```
pub fn tokens_path() -> PathBuf {
    match non_empty_var("SPOTIFY_TOKENS_PATH") {
        Some(path) => expand_home(&path),
        None => app_dir().join("tokens.json"),
    }
}

/// Whether the executor checks stored scopes before each call (`SPOTIFY_VERIFY_SCOPES`).
pub fn verify_scopes() -> bool {
    non_empty_var("SPOTIFY_VERIFY_SCOPES")
        .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Upper bound on waiting for the browser callback (`SPOTIFY_AUTH_TIMEOUT_SECS`).
pub fn auth_timeout() -> Duration {
    let secs = non_empty_var("SPOTIFY_AUTH_TIMEOUT_SECS")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_AUTH_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// A resolved snapshot of all configuration the core needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub auth_url: Url,
    pub token_url: Url,
    pub api_url: String,
    pub tokens_path: PathBuf,
    pub verify_scopes: bool,
    pub auth_timeout: Duration,
}

impl Settings {
    /// Builds settings from the environment.
    ///
    /// Call [`load_env`] first so values from the `.env` file are visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - `SPOTIFY_API_AUTH_CLIENT_ID` is not set
    /// - the redirect, authorization or token URL does not parse
    ///
    /// # Example
    ///
    /// ```
    /// use spotmcp::config::{self, Settings};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     config::load_env().await.ok();
    ///     match Settings::from_env() {
    ///         Ok(settings) => println!("tokens at {}", settings.tokens_path.display()),
    ///         Err(e) => eprintln!("{}", e),
    ///     }
    /// }
    /// ```
    pub fn from_env() -> Res<Self> {
        let client_id = spotify_client_id()
            .ok_or_else(|| Error::Config("SPOTIFY_API_AUTH_CLIENT_ID must be set".into()))?;

        Ok(Self {
            client_id,
            client_secret: spotify_client_secret(),
            redirect_uri: parse_url("SPOTIFY_API_REDIRECT_URI", &spotify_redirect_uri())?,
            scopes: spotify_scope(),
            auth_url: parse_url("SPOTIFY_API_AUTH_URL", &spotify_apiauth_url())?,
            token_url: parse_url("SPOTIFY_API_TOKEN_URL", &spotify_apitoken_url())?,
            api_url: spotify_apiurl().trim_end_matches('/').to_string(),
            tokens_path: tokens_path(),
            verify_scopes: verify_scopes(),
            auth_timeout: auth_timeout(),
        })
    }

    /// Settings pointing at explicit endpoints, with defaults for the rest.
    pub fn new(client_id: impl Into<String>, tokens_path: impl Into<PathBuf>) -> Res<Self> {
        Ok(Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: parse_url("redirect uri", DEFAULT_REDIRECT_URI)?,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: parse_url("auth url", DEFAULT_AUTH_URL)?,
            token_url: parse_url("token url", DEFAULT_TOKEN_URL)?,
            api_url: DEFAULT_API_URL.to_string(),
            tokens_path: tokens_path.into(),
            verify_scopes: false,
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
        })
    }

    /// True when no client secret is configured and PKCE must be used.
    pub fn is_public_client(&self) -> bool {
        self.client_secret.is_none()
    }

    /// Full URL for a resource path such as `/me/player`.
    pub fn api_endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.api_url, path)
        } else {
            format!("{}/{}", self.api_url, path)
        }
    }
}

fn parse_url(name: &str, raw: &str) -> Res<Url> {
    Url::parse(raw).map_err(|e| Error::Config(format!("{name} is not a valid URL ({raw}): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_endpoint_joins_slashes() {
        let mut settings = Settings::new("cid", "/tmp/tokens.json").unwrap();
        settings.api_url = "http://localhost:9000/v1".into();
        assert_eq!(settings.api_endpoint("/me/player"), "http://localhost:9000/v1/me/player");
        assert_eq!(settings.api_endpoint("me/player"), "http://localhost:9000/v1/me/player");
    }

    #[test]
    fn test_default_settings_are_public_client() {
        let settings = Settings::new("cid", "/tmp/tokens.json").unwrap();
        assert!(settings.is_public_client());
        assert!(!settings.verify_scopes);
        assert_eq!(settings.auth_timeout, Duration::from_secs(120));
        assert_eq!(settings.redirect_uri.path(), "/auth/callback");
    }

    #[test]
    fn test_default_scopes_are_well_formed() {
        assert!(DEFAULT_SCOPES.contains(&"playlist-modify-private"));
        assert!(DEFAULT_SCOPES.iter().all(|s| !s.contains(' ')));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/tokens.json"), PathBuf::from("/abs/tokens.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/t.json"), home.join("t.json"));
        }
    }
}
