//! # Spotify Integration Module
//!
//! Everything that talks to Spotify: the OAuth grants, the interactive
//! authorization flow, and the authenticated request executor that resource
//! clients are built on.
//!
//! ```text
//! Playback (and other resource clients)
//!          ↓  Arc<dyn Requester>
//! SpotifyClient ── TokenManager ── TokenStore (tokens.json)
//!          ↓            ↓
//!     Web API     accounts service (token endpoint)
//!                       ↑
//!             AuthorizationFlow ── loopback listener
//! ```
//!
//! ## Modules
//!
//! - [`auth`] - PKCE helpers, authorize URL, and the token endpoint grants
//!   (authorization code, refresh, client credentials).
//! - [`flow`] - Browser based authorization with a single attempt in flight.
//! - [`client`] - The [`Requester`] seam and its authenticated implementation.
//! - [`classify`] - Maps raw responses to values or typed errors.
//! - [`scopes`] - Feature to scope requirements and the missing-scope check.
//! - [`playback`] - Player endpoints.
//!
//! Access tokens are refreshed 60 seconds before they expire, and once more
//! after any 401. A refresh that the provider rejects surfaces as
//! [`crate::error::Error::RefreshNotPossible`], which means the user has to
//! run `spotmcp auth` again.

pub mod auth;
pub mod classify;
pub mod client;
pub mod flow;
pub mod playback;
pub mod scopes;

pub use client::{Requester, SpotifyClient};
pub use flow::{AuthorizationFlow, FlowStart, FlowState};
pub use playback::{Playback, RepeatMode};
pub use scopes::Feature;
