use std::time::Duration;

use chrono::DateTime;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Res,
    cli::Context,
    error::Error,
    info,
    spotify::FlowStart,
    success, warning,
};

/// Authorizes with Spotify and stores the credential.
///
/// With `app_only` the client credentials grant is used instead of the
/// browser; that needs a client secret and yields a credential without a
/// refresh token or user scopes.
pub async fn auth(ctx: &Context, app_only: bool) -> Res<()> {
    if app_only {
        if ctx.settings.is_public_client() {
            return Err(Error::Config(
                "--app-only needs SPOTIFY_API_AUTH_CLIENT_SECRET".into(),
            ));
        }
        let credential = ctx.tokens.grant_client_credentials().await?;
        success!(
            "App-only credential stored at {}",
            ctx.tokens.store().path().display()
        );
        print_expiry(credential.expires_at);
        return Ok(());
    }

    let flow = ctx.flow();
    match flow.start().await? {
        FlowStart::Started { authorize_url } => {
            info!("If the browser did not open, visit:\n{}", authorize_url);
        }
        FlowStart::AlreadyInProgress => return Err(Error::AuthorizationInProgress),
    }

    let pb = ProgressBar::new_spinner();
    pb.set_message(format!(
        "Waiting for Spotify authorization (up to {}s)...",
        ctx.settings.auth_timeout.as_secs()
    ));
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let result = flow.wait().await;
    pb.finish_and_clear();
    let credential = result?;

    success!(
        "Authorized. Credential stored at {}",
        ctx.tokens.store().path().display()
    );
    print_expiry(credential.expires_at);

    let missing = crate::spotify::scopes::missing_scopes(
        &credential,
        ctx.settings.scopes.iter().map(String::as_str),
    );
    if !credential.scopes.is_empty() && !missing.is_empty() {
        warning!(
            "Spotify did not grant: {}",
            missing.into_iter().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}

fn print_expiry(expires_at: i64) {
    if let Some(at) = DateTime::from_timestamp(expires_at, 0) {
        info!("Access token valid until {}", at.to_rfc3339());
    }
}
