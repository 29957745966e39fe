use std::{fmt, str::FromStr, sync::Arc};

use reqwest::Method;
use serde_json::{Value, json};

use crate::{
    Res,
    error::Error,
    spotify::{client::Requester, scopes::Feature},
    types::RequestOptions,
};

/// Repeat mode accepted by `PUT /me/player/repeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RepeatMode {
    Track,
    Context,
    Off,
}

impl RepeatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::Track => "track",
            RepeatMode::Context => "context",
            RepeatMode::Off => "off",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "track" => Ok(RepeatMode::Track),
            "context" => Ok(RepeatMode::Context),
            "off" => Ok(RepeatMode::Off),
            other => Err(Error::Config(format!(
                "unknown repeat mode `{other}`, expected track, context or off"
            ))),
        }
    }
}

/// Player endpoints of the Web API. Every call goes through the shared
/// [`Requester`] with the playback feature attached.
#[derive(Clone)]
pub struct Playback {
    requester: Arc<dyn Requester>,
}

impl Playback {
    pub fn new(requester: Arc<dyn Requester>) -> Self {
        Self { requester }
    }

    async fn call(&self, method: Method, path: &str, options: RequestOptions) -> Res<Value> {
        self.requester
            .execute(method, path, Some(Feature::Playback), options)
            .await
    }

    /// Current playback state. `true` when nothing is playing (204).
    pub async fn state(&self) -> Res<Value> {
        self.call(Method::GET, "/me/player", RequestOptions::new()).await
    }

    pub async fn devices(&self) -> Res<Value> {
        self.call(Method::GET, "/me/player/devices", RequestOptions::new())
            .await
    }

    /// Resumes playback, or starts `uri` when given. Track URIs are sent as
    /// `uris`, anything else as `context_uri`.
    pub async fn play(&self, uri: Option<&str>) -> Res<Value> {
        let options = match uri {
            Some(uri) if uri.starts_with("spotify:track:") => {
                RequestOptions::new().body(json!({ "uris": [uri] }))
            }
            Some(uri) => RequestOptions::new().body(json!({ "context_uri": uri })),
            None => RequestOptions::new(),
        };
        self.call(Method::PUT, "/me/player/play", options).await
    }

    pub async fn pause(&self) -> Res<Value> {
        self.call(Method::PUT, "/me/player/pause", RequestOptions::new())
            .await
    }

    pub async fn next(&self) -> Res<Value> {
        self.call(Method::POST, "/me/player/next", RequestOptions::new())
            .await
    }

    pub async fn previous(&self) -> Res<Value> {
        self.call(Method::POST, "/me/player/previous", RequestOptions::new())
            .await
    }

    /// Sets the volume in percent. Values above 100 are rejected locally.
    pub async fn set_volume(&self, percent: u8) -> Res<Value> {
        if percent > 100 {
            return Err(Error::Config(format!(
                "volume must be between 0 and 100, got {percent}"
            )));
        }
        let options = RequestOptions::new().query("volume_percent", percent.to_string());
        self.call(Method::PUT, "/me/player/volume", options).await
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Res<Value> {
        let options = RequestOptions::new().query("state", mode.as_str());
        self.call(Method::PUT, "/me/player/repeat", options).await
    }

    pub async fn queue(&self, uri: &str) -> Res<Value> {
        let options = RequestOptions::new().query("uri", uri);
        self.call(Method::POST, "/me/player/queue", options).await
    }
}
