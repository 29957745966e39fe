//! Credential state: the file on disk, the in-memory copy handed to requests,
//! and a read-only report of both for diagnostics.

mod auth;
mod status;
mod store;

pub use auth::TokenManager;
pub use status::{CredentialStatus, TokenStatus, Validity};
pub use store::TokenStore;
