use std::{
    collections::BTreeSet,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::{Res, error::Error, types::Credential};

/// Durable home of the [`Credential`] record.
///
/// Writes go through a temporary file in the destination directory followed
/// by a rename, so a concurrent reader sees either the old file or the new
/// one, never a torn write.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        async_fs::metadata(&self.path).await.is_ok()
    }

    /// Reads and validates the credential file. Never creates anything.
    pub async fn load(&self) -> Res<Credential> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NoCredentialFile(self.path.clone()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        parse_credential(&content).map_err(|detail| Error::InvalidCredentialFile {
            path: self.path.clone(),
            detail,
        })
    }

    /// Like [`TokenStore::load`] but maps a missing file to `None`.
    pub async fn try_load(&self) -> Res<Option<Credential>> {
        match self.load().await {
            Ok(credential) => Ok(Some(credential)),
            Err(Error::NoCredentialFile(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Atomically replaces the credential file, creating parent directories.
    pub async fn save(&self, credential: &Credential) -> Res<()> {
        let json = serde_json::to_vec_pretty(credential)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &json, persist_temp))
            .await
            .map_err(|e| Error::Io(io::Error::other(e)))??;

        tracing::debug!(path = %self.path.display(), "credential file written");
        Ok(())
    }
}

fn persist_temp(tmp: NamedTempFile, dest: &Path) -> io::Result<()> {
    // On failure the returned NamedTempFile is dropped, which unlinks it.
    tmp.persist(dest).map(|_| ()).map_err(|e| e.error)
}

fn write_atomic<F>(dest: &Path, bytes: &[u8], rename: F) -> io::Result<()>
where
    F: FnOnce(NamedTempFile, &Path) -> io::Result<()>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".tokens-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    rename(tmp, dest)
}

/// Validates the raw file content, naming every missing or mistyped field.
fn parse_credential(content: &str) -> Result<Credential, String> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| format!("not valid JSON ({e})"))?;
    let Value::Object(map) = value else {
        return Err("expected a JSON object".to_string());
    };

    let mut missing: Vec<&str> = Vec::new();
    let mut invalid: Vec<&str> = Vec::new();

    let access_token = string_field(&map, "access_token", &mut missing, &mut invalid);
    let refresh_token = string_field(&map, "refresh_token", &mut missing, &mut invalid);

    let expires_at = match map.get("expires_at") {
        None => {
            missing.push("expires_at");
            None
        }
        Some(v) => {
            let coerced = v
                .as_i64()
                .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64));
            if coerced.is_none() {
                invalid.push("expires_at");
            }
            coerced
        }
    };

    let scopes = match map.get("scopes") {
        None | Some(Value::Null) => Some(BTreeSet::new()),
        Some(Value::String(raw)) => Some(crate::types::parse_scope_list(raw)),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect::<Option<BTreeSet<_>>>(),
        Some(_) => None,
    };
    if scopes.is_none() {
        invalid.push("scopes");
    }

    if !missing.is_empty() || !invalid.is_empty() {
        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing: {}", missing.join(", ")));
        }
        if !invalid.is_empty() {
            parts.push(format!("invalid types: {}", invalid.join(", ")));
        }
        return Err(parts.join("; "));
    }

    match (access_token, refresh_token, expires_at, scopes) {
        (Some(access_token), Some(refresh_token), Some(expires_at), Some(scopes)) => Ok(Credential {
            access_token,
            refresh_token,
            expires_at,
            scopes,
        }),
        _ => Err("incomplete credential".to_string()),
    }
}

fn string_field<'a>(
    map: &Map<String, Value>,
    key: &'a str,
    missing: &mut Vec<&'a str>,
    invalid: &mut Vec<&'a str>,
) -> Option<String> {
    match map.get(key) {
        None => {
            missing.push(key);
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            invalid.push(key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("nested").join("tokens.json"))
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let credential = Credential::new("a", "r", 1_700_000_000)
            .with_scopes(["user-read-playback-state", "playlist-read-private"]);

        store.save(&credential).await.unwrap();
        assert_eq!(store.load().await.unwrap(), credential);
        assert!(leftovers(store.path().parent().unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_without_scopes_omits_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let credential = Credential::new("a", "", 1);

        store.save(&credential).await.unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw.get("scopes").is_none());
        assert_eq!(store.load().await.unwrap(), credential);
    }

    #[tokio::test]
    async fn test_scopes_as_string_or_list_load_equal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        fs::write(
            store.path(),
            r#"{"access_token":"a","refresh_token":"r","expires_at":1,"scopes":"b a"}"#,
        )
        .unwrap();
        let from_string = store.load().await.unwrap();

        fs::write(
            store.path(),
            r#"{"access_token":"a","refresh_token":"r","expires_at":1,"scopes":["a","b"]}"#,
        )
        .unwrap();
        let from_list = store.load().await.unwrap();

        assert_eq!(from_string, from_list);
        assert_eq!(from_list.scopes.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_distinct_and_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, Error::NoCredentialFile(_)));
        assert!(store.try_load().await.unwrap().is_none());
        assert!(!store.path().exists());
        assert!(!store.path().parent().unwrap().exists());
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{").unwrap();

        match TokenStore::new(&path).load().await {
            Err(Error::InvalidCredentialFile { detail, .. }) => {
                assert!(detail.contains("not valid JSON"), "{detail}")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_fields_are_named() {
        let detail = parse_credential(r#"{"access_token": "a"}"#).unwrap_err();
        assert_eq!(detail, "missing: refresh_token, expires_at");
    }

    #[test]
    fn test_wrong_types_are_named_separately() {
        let detail =
            parse_credential(r#"{"access_token": 123, "refresh_token": "r", "expires_at": "1"}"#)
                .unwrap_err();
        assert_eq!(detail, "invalid types: access_token, expires_at");

        let detail = parse_credential(r#"{"refresh_token": true, "expires_at": 1}"#).unwrap_err();
        assert_eq!(detail, "missing: access_token; invalid types: refresh_token");
    }

    #[test]
    fn test_float_expiry_is_coerced() {
        let cred =
            parse_credential(r#"{"access_token":"a","refresh_token":"r","expires_at":1700.9}"#)
                .unwrap();
        assert_eq!(cred.expires_at, 1700);
    }

    #[tokio::test]
    async fn test_huge_negative_float_expiry_saturates_and_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            r#"{"access_token":"a","refresh_token":"r","expires_at":-1e300}"#,
        )
        .unwrap();

        let cred = store.load().await.unwrap();
        assert_eq!(cred.expires_at, i64::MIN);
        assert!(crate::spotify::auth::needs_refresh(&cred, crate::spotify::auth::now()));
    }

    #[test]
    fn test_non_object_and_bad_scopes() {
        assert_eq!(parse_credential("[]").unwrap_err(), "expected a JSON object");
        let detail = parse_credential(
            r#"{"access_token":"a","refresh_token":"r","expires_at":1,"scopes":[1]}"#,
        )
        .unwrap_err();
        assert_eq!(detail, "invalid types: scopes");
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_destination_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let original = Credential::new("old", "r", 1);
        store.save(&original).await.unwrap();
        let before = fs::read(store.path()).unwrap();

        let replacement = serde_json::to_vec(&Credential::new("new", "r", 2)).unwrap();
        let err = write_atomic(store.path(), &replacement, |tmp, _| {
            drop(tmp);
            Err(io::Error::other("simulated rename failure"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "simulated rename failure");
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert!(leftovers(store.path().parent().unwrap()).is_empty());
        assert_eq!(store.load().await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_rename_over_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tokens.json");
        fs::create_dir_all(dest.join("occupied")).unwrap();

        let result = TokenStore::new(&dest).save(&Credential::new("a", "r", 1)).await;
        assert!(result.is_err());
        assert!(dest.join("occupied").is_dir());
        assert!(leftovers(dir.path()).is_empty());
    }
}
