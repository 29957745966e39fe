//! # CLI Module
//!
//! Command implementations behind the `spotmcp` binary. Each command builds
//! on a [`Context`] holding the resolved settings, one shared HTTP client and
//! the token manager, so every command sees the same credential state.
//!
//! ## Commands
//!
//! - [`auth`] - Browser authorization (or the client credentials grant with
//!   `--app-only`) and storage of the resulting credential.
//! - [`status`] - Credential diagnostics and a per-feature scope table.
//! - [`call`] - Raw authenticated request against any Web API path.
//! - [`player`] - Playback control through [`crate::spotify::Playback`].
//!
//! ```bash
//! spotmcp auth
//! spotmcp status
//! spotmcp player volume 40
//! spotmcp call GET /me/player/devices --feature playback
//! ```

use std::sync::Arc;

use reqwest::Client;

use crate::{
    Res,
    config::Settings,
    management::TokenManager,
    spotify::{AuthorizationFlow, Playback, SpotifyClient},
};

mod auth;
mod call;
mod player;
mod status;

pub use auth::auth;
pub use call::{call, parse_query_pair};
pub use player::{PlayerAction, player};
pub use status::status;

/// Shared wiring for one CLI invocation.
pub struct Context {
    pub settings: Arc<Settings>,
    pub http: Client,
    pub tokens: Arc<TokenManager>,
}

impl Context {
    pub fn new(settings: Settings) -> Res<Self> {
        let settings = Arc::new(settings);
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let tokens = Arc::new(TokenManager::new(Arc::clone(&settings), http.clone()));

        Ok(Self {
            settings,
            http,
            tokens,
        })
    }

    pub fn from_env() -> Res<Self> {
        Self::new(Settings::from_env()?)
    }

    pub fn flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::new(Arc::clone(&self.tokens), self.http.clone())
    }

    pub fn client(&self) -> Arc<SpotifyClient> {
        Arc::new(SpotifyClient::new(Arc::clone(&self.tokens), self.http.clone()))
    }

    pub fn playback(&self) -> Playback {
        Playback::new(self.client())
    }
}
