use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::{
    Res,
    error::Error,
    management::TokenManager,
    spotify::{
        classify::classify_response,
        scopes::{self, Feature},
    },
    types::{Credential, RequestOptions},
};

/// The single seam through which resource clients reach the Web API.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        feature: Option<Feature>,
        options: RequestOptions,
    ) -> Res<Value>;
}

/// Authenticated request executor.
///
/// Attaches the bearer token, refreshes ahead of expiry, retries exactly once
/// after a 401, and hands every response to [`classify_response`].
pub struct SpotifyClient {
    tokens: Arc<TokenManager>,
    http: Client,
}

impl SpotifyClient {
    pub fn new(tokens: Arc<TokenManager>, http: Client) -> Self {
        Self { tokens, http }
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        credential: &Credential,
        options: &RequestOptions,
    ) -> Res<(StatusCode, String)> {
        let url = self.tokens.settings().api_endpoint(path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&credential.access_token);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        tracing::debug!(%method, path, "spotify request");
        let res = request.send().await?;
        let status = res.status();
        let body = res.text().await?;
        tracing::debug!(%method, path, status = status.as_u16(), "spotify response");

        Ok((status, body))
    }
}

#[async_trait]
impl Requester for SpotifyClient {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        feature: Option<Feature>,
        options: RequestOptions,
    ) -> Res<Value> {
        let mut credential = self.tokens.valid_credential().await?;

        if let Some(feature) = feature {
            if self.tokens.settings().verify_scopes {
                scopes::check_feature(&credential, feature)?;
            }
        }

        let (mut status, mut body) = self.send(&method, path, &credential, &options).await?;

        if status == StatusCode::UNAUTHORIZED {
            if !credential.has_refresh_token() {
                return Err(Error::refresh_not_possible(
                    Some(status),
                    "access token rejected and no refresh token stored, run `spotmcp auth`",
                ));
            }
            tracing::info!(path, "access token rejected, refreshing once");
            credential = self.tokens.refresh(&credential).await?;
            (status, body) = self.send(&method, path, &credential, &options).await?;
        }

        let result = classify_response(&method, path, status, &body, feature, &credential);
        if let Err(e) = &result {
            tracing::warn!(%method, path, error = %e, "spotify request failed");
        }
        result
    }
}
