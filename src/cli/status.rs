use tabled::Table;

use crate::{
    Res,
    cli::Context,
    info,
    management::{TokenStatus, Validity},
    spotify::auth::now,
    success, warning,
};

/// Prints what is known about the stored credential. Never refreshes.
pub async fn status(ctx: &Context) -> Res<()> {
    let report = TokenStatus::inspect(ctx.tokens.store(), &ctx.settings, now()).await;
    info!("Credential file: {}", report.path.display());
    info!(
        "Client mode: {}",
        if ctx.settings.is_public_client() {
            "public (PKCE)"
        } else {
            "confidential"
        }
    );

    let status = match report.validity {
        Validity::Missing => {
            warning!("No credential stored. Run `spotmcp auth`.");
            return Ok(());
        }
        Validity::Invalid(detail) => {
            warning!("Credential file is invalid: {}", detail);
            warning!("Fix or delete it, then run `spotmcp auth`.");
            return Ok(());
        }
        Validity::Valid(status) => status,
    };

    if let Some(at) = status.expires_at {
        if status.minutes_left >= 0 {
            info!("Expires: {} ({} min left)", at.to_rfc3339(), status.minutes_left);
        } else {
            warning!("Expired: {} ({} min ago)", at.to_rfc3339(), -status.minutes_left);
        }
    }

    if status.has_refresh_token {
        success!("Refresh token present");
    } else if status.needs_refresh {
        warning!("No refresh token and the access token is expired. Run `spotmcp auth`.");
    } else {
        warning!("No refresh token, a new authorization is needed once this token expires");
    }

    if status.granted.is_empty() {
        info!("Granted scopes: none recorded");
    } else {
        info!(
            "Granted scopes: {}",
            status.granted.iter().cloned().collect::<Vec<_>>().join(" ")
        );
    }
    if !status.missing_requested.is_empty() {
        warning!(
            "Requested but not granted: {}",
            status
                .missing_requested
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        );
    }

    let usable: Vec<String> = status
        .usable_features()
        .into_iter()
        .map(|f| f.to_string())
        .collect();
    info!("Usable features: {}", usable.join(", "));

    let table = Table::new(status.scope_rows());
    println!("{table}");
    Ok(())
}
