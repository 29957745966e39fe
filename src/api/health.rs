use axum::{Extension, response::Json};
use serde_json::{Value, json};

use crate::api::CallbackState;

/// Liveness of the callback listener, and whether it still waits for the redirect.
pub async fn health(Extension(shared_state): Extension<CallbackState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": crate::config::APP_NAME,
        "awaiting_callback": shared_state.is_pending().await,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
