#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use reqwest::{Client, Url};
use spotmcp::{
    config::Settings,
    management::{TokenManager, TokenStore},
    spotify::{SpotifyClient, auth::now},
    types::Credential,
};
use tempfile::TempDir;
use wiremock::MockServer;

pub const PLAYBACK_SCOPES: [&str; 3] = [
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
];

/// Settings with the token endpoint and API base pointed at `server`.
pub fn settings(server: &MockServer, dir: &TempDir) -> Settings {
    let mut settings = Settings::new("test-client", tokens_path(dir)).unwrap();
    settings.token_url = Url::parse(&format!("{}/api/token", server.uri())).unwrap();
    settings.auth_url = Url::parse(&format!("{}/authorize", server.uri())).unwrap();
    settings.api_url = format!("{}/v1", server.uri());
    settings.auth_timeout = Duration::from_secs(5);
    settings
}

pub fn tokens_path(dir: &TempDir) -> PathBuf {
    dir.path().join("tokens.json")
}

pub fn credential(access: &str, refresh: &str, expires_in: i64) -> Credential {
    Credential::new(access, refresh, now() + expires_in).with_scopes(PLAYBACK_SCOPES)
}

pub async fn store_credential(dir: &TempDir, credential: &Credential) {
    TokenStore::new(tokens_path(dir))
        .save(credential)
        .await
        .unwrap();
}

pub async fn read_credential(dir: &TempDir) -> Credential {
    TokenStore::new(tokens_path(dir)).load().await.unwrap()
}

pub fn client(settings: Settings) -> SpotifyClient {
    let http = Client::new();
    let tokens = Arc::new(TokenManager::new(Arc::new(settings), http.clone()));
    SpotifyClient::new(tokens, http)
}
