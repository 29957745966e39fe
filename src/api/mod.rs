//! # API Module
//!
//! HTTP endpoints served by the short-lived loopback listener that catches the
//! OAuth redirect.
//!
//! ## Endpoints
//!
//! - [`callback`] - Receives the authorization redirect. It checks the `state`
//!   nonce, captures the `code` (or the provider's `error`), and hands it to
//!   the waiting [`crate::spotify::flow::AuthorizationFlow`]. Exactly one
//!   valid callback is accepted per attempt.
//! - [`health`] - Liveness check returning service name and version.
//!
//! Requests on any other path get axum's default 404.

mod callback;
mod health;

pub use callback::{CallbackOutcome, CallbackState, callback};
pub use health::health;
