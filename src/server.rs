use axum::{Extension, Router, routing::get};
use reqwest::Url;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use crate::{
    Res,
    api::{self, CallbackState},
    error::Error,
};

/// Binds the loopback listener on the host and port of `redirect_uri`.
///
/// Must complete before the browser is pointed at the provider, otherwise
/// a fast redirect can hit a closed port.
pub async fn bind(redirect_uri: &Url) -> Res<TcpListener> {
    let host = redirect_uri
        .host_str()
        .unwrap_or("127.0.0.1")
        .trim_start_matches('[')
        .trim_end_matches(']');
    let port = redirect_uri.port_or_known_default().unwrap_or(80);

    let listener = TcpListener::bind((host, port)).await.map_err(|e| {
        Error::Authorization(format!("cannot listen on {host}:{port} for the redirect: {e}"))
    })?;
    tracing::debug!(host, port, "callback listener bound");
    Ok(listener)
}

/// Serves the callback and health routes until `shutdown` fires.
pub fn start_api_server(
    listener: TcpListener,
    callback_path: &str,
    state: CallbackState,
    shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    let mut app = Router::new().route(callback_path, get(api::callback));
    if callback_path != "/health" {
        app = app.route("/health", get(api::health));
    }
    let app = app.layer(Extension(state));

    tokio::spawn(async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown.await;
        });
        if let Err(e) = serve.await {
            tracing::warn!(error = %e, "callback listener stopped with an error");
        }
        tracing::debug!("callback listener shut down");
    })
}
