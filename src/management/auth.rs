use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{Mutex, RwLock};

use crate::{
    Res,
    config::Settings,
    error::Error,
    management::TokenStore,
    spotify::auth::{self, needs_refresh, now},
    types::Credential,
};

/// Owns the latest known [`Credential`] and every transition of it.
///
/// The credential file is read lazily on first use and then served from
/// memory. Any new credential is persisted before it becomes visible to
/// other callers, so memory never runs ahead of disk.
pub struct TokenManager {
    settings: Arc<Settings>,
    http: Client,
    store: TokenStore,
    current: RwLock<Option<Credential>>,
    // Held for the whole refresh round trip; collapses concurrent refreshes.
    refresh_gate: Mutex<()>,
}

impl TokenManager {
    pub fn new(settings: Arc<Settings>, http: Client) -> Self {
        let store = TokenStore::new(settings.tokens_path.clone());
        Self {
            settings,
            http,
            store,
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Seeds the in-memory credential without touching the file.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.current = RwLock::new(Some(credential));
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Latest known credential, loading the file on first use.
    ///
    /// A missing file yields `None`; an invalid file is an error on every call
    /// until it is fixed or replaced.
    pub async fn current(&self) -> Res<Option<Credential>> {
        if let Some(credential) = self.current.read().await.as_ref() {
            return Ok(Some(credential.clone()));
        }

        let loaded = self.store.try_load().await?;
        let mut slot = self.current.write().await;
        if slot.is_none() {
            *slot = loaded;
        }
        Ok(slot.clone())
    }

    /// Persists `credential` and makes it the current one.
    pub async fn replace(&self, credential: Credential) -> Res<()> {
        self.store.save(&credential).await?;
        *self.current.write().await = Some(credential);
        Ok(())
    }

    /// Refreshes `stale` and persists the result before returning it.
    ///
    /// If another task already replaced `stale` while this one waited for the
    /// gate, its result is returned without another provider round trip.
    pub async fn refresh(&self, stale: &Credential) -> Res<Credential> {
        let _gate = self.refresh_gate.lock().await;

        if let Some(current) = self.current.read().await.as_ref() {
            if current.access_token != stale.access_token {
                tracing::debug!("reusing credential refreshed by a concurrent caller");
                return Ok(current.clone());
            }
        }

        let refreshed = auth::refresh_token(&self.http, &self.settings, stale)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "token refresh failed"))?;
        self.replace(refreshed.clone()).await?;

        tracing::info!(expires_at = refreshed.expires_at, "access token refreshed");
        Ok(refreshed)
    }

    /// A credential that is not about to expire, refreshing it if possible.
    ///
    /// Credentials without a refresh token are returned as they are; they
    /// stay usable until the provider rejects them.
    pub async fn valid_credential(&self) -> Res<Credential> {
        let credential = self.current().await?.ok_or(Error::NotAuthenticated)?;
        if credential.has_refresh_token() && needs_refresh(&credential, now()) {
            return self.refresh(&credential).await;
        }
        Ok(credential)
    }

    /// Replaces the stored credential with an app-only one from the
    /// client-credentials grant.
    pub async fn grant_client_credentials(&self) -> Res<Credential> {
        let credential = auth::client_credentials(&self.http, &self.settings).await?;
        self.replace(credential.clone()).await?;
        tracing::info!("stored app-only credential from client credentials grant");
        Ok(credential)
    }
}
