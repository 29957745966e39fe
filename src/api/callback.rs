use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension,
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tokio::sync::{Mutex, oneshot};

use crate::config::APP_NAME;

/// What the callback handler hands back to the waiting flow: the
/// authorization code, or the provider's `error` parameter.
pub type CallbackOutcome = Result<String, String>;

/// Per-attempt state shared with the callback route.
#[derive(Clone)]
pub struct CallbackState {
    expected_state: Arc<str>,
    sender: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

impl CallbackState {
    pub fn new(expected_state: impl Into<Arc<str>>, sender: oneshot::Sender<CallbackOutcome>) -> Self {
        Self {
            expected_state: expected_state.into(),
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// True until a valid callback has been handed to the flow.
    pub async fn is_pending(&self) -> bool {
        self.sender.lock().await.is_some()
    }
}

const NEXT_COMMANDS: &[&str] = &[
    "spotmcp status",
    "spotmcp player state",
    "spotmcp player play",
    "spotmcp player pause",
    "spotmcp player next",
    "spotmcp player volume 50",
];

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(shared_state): Extension<CallbackState>,
) -> Response {
    if params.get("state").map(String::as_str) != Some(&*shared_state.expected_state) {
        tracing::warn!("rejected authorization callback with mismatched state");
        return (StatusCode::BAD_REQUEST, Html("<h4>State mismatch.</h4>")).into_response();
    }

    let outcome = match (params.get("code"), params.get("error")) {
        (Some(code), _) => Ok(code.clone()),
        (None, Some(error)) => Err(error.clone()),
        (None, None) => {
            return (StatusCode::BAD_REQUEST, Html("<h4>Missing authorization code.</h4>"))
                .into_response();
        }
    };

    let Some(sender) = shared_state.sender.lock().await.take() else {
        return (StatusCode::BAD_REQUEST, Html("<h4>Authorization already handled.</h4>"))
            .into_response();
    };

    let denied = outcome.is_err();
    if sender.send(outcome).is_err() {
        return (StatusCode::GONE, Html("<h4>Authorization attempt expired.</h4>")).into_response();
    }

    if denied {
        (StatusCode::BAD_REQUEST, Html("<h4>Authorization denied.</h4>")).into_response()
    } else {
        (StatusCode::OK, Html(success_page(NEXT_COMMANDS))).into_response()
    }
}

fn success_page(commands: &[&str]) -> String {
    let items: String = commands
        .iter()
        .map(|cmd| format!("<li><code>{cmd}</code></li>\n"))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>{APP_NAME}</title>
<style>
body{{font-family:sans-serif;max-width:600px;margin:2rem auto;padding:1rem;line-height:1.6}}
a{{color:#1DB954}}
</style>
</head>
<body>
<h1>{APP_NAME}</h1>
<p>Your Spotify account is connected. The tools can now control playback, search and manage playlists.</p>
<h2>What next?</h2>
<ul>
{items}</ul>
<button type="button" onclick="window.close()">Close</button>
<p>You can close this window and return to your client.</p>
</body>
</html>"#
    )
}
