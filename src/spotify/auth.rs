use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::Rng;
use reqwest::{Client, StatusCode, Url};
use sha2::{Digest, Sha256};

use crate::{
    Res,
    config::Settings,
    error::Error,
    types::{Credential, TokenResponse},
};

/// Seconds before `expires_at` at which a token is already treated as stale.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Current time in epoch seconds.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// True iff `now >= expires_at - 60`.
///
/// Saturates at the ends of the `i64` range, so a corrupt far-past expiry
/// counts as expired and a far-future one as fresh.
pub fn needs_refresh(credential: &Credential, now: i64) -> bool {
    now >= credential.expires_at.saturating_sub(REFRESH_MARGIN_SECS)
}

/// PKCE code verifier: 64 random bytes, base64url without padding (86 chars).
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `BASE64URL(SHA256(verifier))`, unpadded.
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Random `state` nonce binding a callback to the attempt that issued it.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Builds the browser URL for the authorization endpoint.
///
/// # Arguments
///
/// * `settings` - Client id, redirect URI, scopes and the authorization endpoint
/// * `state` - The attempt's nonce, echoed back on the callback
/// * `code_challenge` - PKCE challenge; public clients only, sent with method `S256`
///
/// # Example
///
/// ```
/// let url = build_authorize_url(&settings, &generate_state(), None);
/// webbrowser::open(url.as_str())?;
/// ```
pub fn build_authorize_url(settings: &Settings, state: &str, code_challenge: Option<&str>) -> Url {
    let mut url = settings.auth_url.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("client_id", &settings.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", settings.redirect_uri.as_str())
            .append_pair("scope", &settings.scopes.join(" "))
            .append_pair("state", state);
        if let Some(challenge) = code_challenge {
            query
                .append_pair("code_challenge", challenge)
                .append_pair("code_challenge_method", "S256");
        }
    }
    url
}

/// Exchanges an authorization code for a credential.
///
/// Confidential clients authenticate with HTTP basic auth; public clients
/// send `client_id` and the PKCE `code_verifier` instead of a secret.
///
/// # Arguments
///
/// * `http` - Shared HTTP client
/// * `settings` - Client identity, redirect URI and token endpoint
/// * `code` - The `code` parameter received on the callback
/// * `code_verifier` - The attempt's PKCE verifier, for public clients
///
/// # Errors
///
/// Returns an error if:
/// - The token endpoint answers with a non-success status ([`Error::Authorization`])
/// - The request fails or the body is not a token response
///
/// # Example
///
/// ```
/// let credential = exchange_code(&http, &settings, &code, Some(&verifier)).await?;
/// ```
pub async fn exchange_code(
    http: &Client,
    settings: &Settings,
    code: &str,
    code_verifier: Option<&str>,
) -> Res<Credential> {
    let redirect_uri = settings.redirect_uri.to_string();
    let mut form: Vec<(&str, &str)> = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri.as_str()),
    ];

    let mut request = http.post(settings.token_url.clone());
    match &settings.client_secret {
        Some(secret) => {
            request = request.basic_auth(&settings.client_id, Some(secret));
        }
        None => {
            form.push(("client_id", settings.client_id.as_str()));
            form.push(("code_verifier", code_verifier.unwrap_or_default()));
        }
    }

    let res = request.form(&form).send().await?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(Error::Authorization(format!(
            "code exchange failed with {status}: {body}"
        )));
    }

    let response: TokenResponse = res.json().await?;
    Ok(Credential::from_response(response, now(), None))
}

/// Trades the credential's refresh token for a new access token.
///
/// Does not persist anything; see [`crate::management::TokenManager::refresh`].
/// A refresh token or scope list missing from the response is carried over
/// from `credential`.
///
/// # Errors
///
/// Returns [`Error::RefreshNotPossible`] if the credential has no refresh
/// token or the endpoint answers with anything but 200. Transport and decode
/// failures are returned as they are.
///
/// # Example
///
/// ```
/// let renewed = refresh_token(&http, &settings, &stale).await?;
/// ```
pub async fn refresh_token(
    http: &Client,
    settings: &Settings,
    credential: &Credential,
) -> Res<Credential> {
    if !credential.has_refresh_token() {
        return Err(Error::refresh_not_possible(
            None,
            "no refresh token stored, run `spotmcp auth`",
        ));
    }

    let mut form: Vec<(&str, &str)> = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", credential.refresh_token.as_str()),
        ("client_id", settings.client_id.as_str()),
    ];
    if let Some(secret) = &settings.client_secret {
        form.push(("client_secret", secret.as_str()));
    }

    let res = http.post(settings.token_url.clone()).form(&form).send().await?;
    let status = res.status();
    if status != StatusCode::OK {
        return Err(Error::refresh_not_possible(
            Some(status),
            format!("token refresh failed: {status}"),
        ));
    }

    let response: TokenResponse = res.json().await?;
    Ok(Credential::from_response(response, now(), Some(credential)))
}

/// Obtains an app-only credential through the client credentials grant.
///
/// The result carries no refresh token, even if the endpoint sends one, and
/// no user scopes. Once it expires the grant has to run again.
///
/// # Errors
///
/// Returns an error if:
/// - No client secret is configured ([`Error::Config`])
/// - The token endpoint answers with a non-success status ([`Error::Authorization`])
/// - The request fails or the body is not a token response
///
/// # Example
///
/// ```
/// let credential = client_credentials(&http, &settings).await?;
/// assert!(!credential.has_refresh_token());
/// ```
pub async fn client_credentials(http: &Client, settings: &Settings) -> Res<Credential> {
    let Some(secret) = &settings.client_secret else {
        return Err(Error::Config(
            "SPOTIFY_API_AUTH_CLIENT_SECRET is required for the client credentials grant".into(),
        ));
    };

    let res = http
        .post(settings.token_url.clone())
        .basic_auth(&settings.client_id, Some(secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(Error::Authorization(format!(
            "client credentials grant failed with {status}: {body}"
        )));
    }

    let response: TokenResponse = res.json().await?;
    let mut credential = Credential::from_response(response, now(), None);
    credential.refresh_token.clear();
    Ok(credential)
}
