use std::{collections::BTreeSet, path::PathBuf};

use chrono::{DateTime, Utc};

use crate::{
    config::Settings,
    error::Error,
    management::TokenStore,
    spotify::{
        auth::needs_refresh,
        scopes::{Feature, missing_scopes},
    },
    types::{Credential, ScopeTableRow},
};

/// What is known about the stored credential, without touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Missing,
    Invalid(String),
    Valid(CredentialStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub expires_at: Option<DateTime<Utc>>,
    /// Negative once expired.
    pub minutes_left: i64,
    pub needs_refresh: bool,
    pub has_refresh_token: bool,
    pub granted: BTreeSet<String>,
    /// Requested in the configuration but not granted.
    pub missing_requested: BTreeSet<String>,
    pub features: Vec<(Feature, BTreeSet<String>)>,
}

impl CredentialStatus {
    fn inspect(credential: &Credential, requested: &[String], now: i64) -> Self {
        Self {
            expires_at: DateTime::from_timestamp(credential.expires_at, 0),
            minutes_left: credential.expires_at.saturating_sub(now).div_euclid(60),
            needs_refresh: needs_refresh(credential, now),
            has_refresh_token: credential.has_refresh_token(),
            granted: credential.scopes.clone(),
            missing_requested: missing_scopes(credential, requested.iter().map(String::as_str)),
            features: Feature::ALL
                .iter()
                .map(|f| (*f, missing_scopes(credential, f.required_scopes().iter().copied())))
                .collect(),
        }
    }

    /// Features whose scopes are all granted.
    pub fn usable_features(&self) -> Vec<Feature> {
        self.features
            .iter()
            .filter(|(_, missing)| missing.is_empty())
            .map(|(f, _)| *f)
            .collect()
    }

    pub fn scope_rows(&self) -> Vec<ScopeTableRow> {
        self.features
            .iter()
            .map(|(feature, missing)| ScopeTableRow {
                feature: feature.to_string(),
                required: join_or_dash(feature.required_scopes().iter().copied()),
                missing: join_or_dash(missing.iter().map(String::as_str)),
            })
            .collect()
    }
}

/// Snapshot of the credential file for `spotmcp status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    pub path: PathBuf,
    pub validity: Validity,
}

impl TokenStatus {
    /// Reads the credential file and evaluates it against `settings`.
    ///
    /// I/O failures other than a missing file are reported as invalid rather
    /// than returned, so the report is always produced.
    pub async fn inspect(store: &TokenStore, settings: &Settings, now: i64) -> Self {
        if !store.exists().await {
            return Self {
                path: store.path().to_path_buf(),
                validity: Validity::Missing,
            };
        }

        let validity = match store.load().await {
            Ok(credential) => Validity::Valid(CredentialStatus::inspect(
                &credential,
                &settings.scopes,
                now,
            )),
            Err(Error::NoCredentialFile(_)) => Validity::Missing,
            Err(Error::InvalidCredentialFile { detail, .. }) => Validity::Invalid(detail),
            Err(e) => Validity::Invalid(e.to_string()),
        };

        Self {
            path: store.path().to_path_buf(),
            validity,
        }
    }
}

fn join_or_dash<'a>(scopes: impl Iterator<Item = &'a str>) -> String {
    let joined = scopes.collect::<Vec<_>>().join(" ");
    if joined.is_empty() { "-".to_string() } else { joined }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_status_reports_expiry_and_missing() {
        let credential = Credential::new("a", "r", 1_000 + 30 * 60).with_scopes([
            "user-read-playback-state",
            "user-modify-playback-state",
            "user-read-currently-playing",
        ]);
        let requested = vec![
            "user-read-playback-state".to_string(),
            "user-library-read".to_string(),
        ];
        let status = CredentialStatus::inspect(&credential, &requested, 1_000);

        assert_eq!(status.minutes_left, 30);
        assert!(!status.needs_refresh);
        assert!(status.has_refresh_token);
        assert_eq!(
            status.missing_requested,
            BTreeSet::from(["user-library-read".to_string()])
        );
        let usable = status.usable_features();
        assert!(usable.contains(&Feature::Playback));
        assert!(usable.contains(&Feature::Search));
        assert!(!usable.contains(&Feature::Library));
    }

    #[test]
    fn test_expired_credential_has_negative_minutes() {
        let credential = Credential::new("a", "", 1_000);
        let status = CredentialStatus::inspect(&credential, &[], 1_090);
        assert_eq!(status.minutes_left, -2);
        assert!(status.needs_refresh);
        assert!(!status.has_refresh_token);
    }

    #[test]
    fn test_extreme_expiry_does_not_overflow() {
        let past = CredentialStatus::inspect(&Credential::new("a", "r", i64::MIN), &[], 1_000);
        assert!(past.minutes_left < 0);
        assert!(past.needs_refresh);
        assert!(past.expires_at.is_none());

        let future = CredentialStatus::inspect(&Credential::new("a", "r", i64::MAX), &[], -1_000);
        assert!(future.minutes_left > 0);
        assert!(!future.needs_refresh);
    }

    #[test]
    fn test_scope_rows_use_dash_for_empty() {
        let credential = Credential::new("a", "r", 0);
        let status = CredentialStatus::inspect(&credential, &[], 0);
        let search = status
            .scope_rows()
            .into_iter()
            .find(|row| row.feature == "search")
            .unwrap();
        assert_eq!(search.required, "-");
        assert_eq!(search.missing, "-");
    }

    #[tokio::test]
    async fn test_inspect_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let settings = Settings::new("cid", &path).unwrap();
        let store = TokenStore::new(&path);

        let status = TokenStatus::inspect(&store, &settings, 0).await;
        assert_eq!(status.validity, Validity::Missing);

        std::fs::write(&path, "{\"access_token\": 1}").unwrap();
        let status = TokenStatus::inspect(&store, &settings, 0).await;
        assert!(matches!(status.validity, Validity::Invalid(_)));
    }
}
