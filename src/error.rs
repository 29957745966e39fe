//! Error taxonomy shared by the token lifecycle and the request executor.
//!
//! Every failure the core can produce maps onto one [`Error`] variant. The
//! classification of provider responses into these variants lives in
//! [`crate::spotify::classify`]; nothing else inspects raw status codes.

use std::{collections::BTreeSet, path::PathBuf};

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The credential file does not exist yet.
    #[error("No credential file at {}. Run `spotmcp auth` first.", .0.display())]
    NoCredentialFile(PathBuf),

    /// The credential file exists but cannot be used. Never auto-repaired.
    #[error("Credential file {} is invalid: {detail}. Fix or delete it and run `spotmcp auth`.", .path.display())]
    InvalidCredentialFile { path: PathBuf, detail: String },

    #[error("Not authenticated with Spotify. Run `spotmcp auth`.")]
    NotAuthenticated,

    #[error("Token refresh not possible: {reason}")]
    RefreshNotPossible {
        status: Option<StatusCode>,
        reason: String,
    },

    #[error("Missing scopes: {}", join_scopes(.0))]
    MissingScopes(BTreeSet<String>),

    #[error("Spotify Premium required: {0}")]
    PremiumRequired(String),

    #[error("No active Spotify device: {0}. Open Spotify on a device and retry.")]
    NoActiveDevice(String),

    #[error("Authorization not completed within {0} seconds. Run `spotmcp auth` again.")]
    AuthorizationTimeout(u64),

    #[error("An authorization flow is already in progress")]
    AuthorizationInProgress,

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn refresh_not_possible(status: Option<StatusCode>, reason: impl Into<String>) -> Self {
        Error::RefreshNotPossible {
            status,
            reason: reason.into(),
        }
    }

    /// True for conditions that a fresh authorization flow resolves.
    pub fn needs_reauthorization(&self) -> bool {
        matches!(
            self,
            Error::NoCredentialFile(_)
                | Error::NotAuthenticated
                | Error::RefreshNotPossible { .. }
                | Error::MissingScopes(_)
                | Error::AuthorizationTimeout(_)
        )
    }
}

fn join_scopes(scopes: &BTreeSet<String>) -> String {
    scopes.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
