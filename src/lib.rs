//! spotmcp library
//!
//! Spotify OAuth credential lifecycle and an authenticated request executor.
//! The crate keeps one credential file, renews its access token ahead of
//! expiry or after a 401, runs the browser authorization flow when nothing
//! usable is stored, and turns Web API failures into typed errors.
//!
//! # Modules
//!
//! - `api` - HTTP handlers of the loopback listener (OAuth callback, health)
//! - `cli` - Command implementations for the `spotmcp` binary
//! - `config` - Environment based configuration and [`config::Settings`]
//! - `error` - The crate wide [`error::Error`] type
//! - `management` - Credential persistence and the token manager
//! - `server` - Binding and serving the loopback listener
//! - `spotify` - Grants, authorization flow, executor and resource clients
//! - `types` - Credential, token response and request option types
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use spotmcp::{config::Settings, management::TokenManager, spotify::{Playback, SpotifyClient}};
//!
//! let settings = Arc::new(Settings::from_env()?);
//! let http = reqwest::Client::new();
//! let tokens = Arc::new(TokenManager::new(settings, http.clone()));
//! let playback = Playback::new(Arc::new(SpotifyClient::new(tokens, http)));
//! let state = playback.state().await?;
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod server;
pub mod spotify;
pub mod types;

/// Result alias used across the crate.
pub type Res<T> = std::result::Result<T, error::Error>;

/// Prints an informational line with a blue bullet.
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success line with a green check mark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error line with a red exclamation mark and exits with code 1.
///
/// Only for the binary's top level; library code returns [`error::Error`].
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning line with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
