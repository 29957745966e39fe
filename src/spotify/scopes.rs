use std::{collections::BTreeSet, fmt, str::FromStr};

use clap::ValueEnum;

use crate::{Res, error::Error, types::Credential};

/// A logical group of API operations sharing one scope requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Feature {
    Playback,
    Playlists,
    Albums,
    Library,
    Artists,
    Search,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Playback,
        Feature::Playlists,
        Feature::Albums,
        Feature::Library,
        Feature::Artists,
        Feature::Search,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Playback => "playback",
            Feature::Playlists => "playlists",
            Feature::Albums => "albums",
            Feature::Library => "library",
            Feature::Artists => "artists",
            Feature::Search => "search",
        }
    }

    /// Scopes Spotify requires for every endpoint of this feature.
    pub fn required_scopes(self) -> &'static [&'static str] {
        match self {
            Feature::Playback => &[
                "user-read-playback-state",
                "user-modify-playback-state",
                "user-read-currently-playing",
            ],
            Feature::Playlists => &[
                "playlist-read-private",
                "playlist-read-collaborative",
                "playlist-modify-private",
                "playlist-modify-public",
            ],
            Feature::Albums | Feature::Library => &["user-library-read", "user-library-modify"],
            // Catalog lookups only need a valid token.
            Feature::Artists | Feature::Search => &[],
        }
    }

    pub fn required_scope_set(self) -> BTreeSet<String> {
        self.required_scopes().iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown feature: {s}")))
    }
}

/// Scopes in `required` that `credential` was not granted.
pub fn missing_scopes<'a, I>(credential: &Credential, required: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    required
        .into_iter()
        .filter(|scope| !credential.scopes.contains(*scope))
        .map(String::from)
        .collect()
}

/// Fails with [`Error::MissingScopes`] naming exactly the scopes not granted.
pub fn check_scopes<'a, I>(credential: &Credential, required: I) -> Res<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let missing = missing_scopes(credential, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingScopes(missing))
    }
}

pub fn check_feature(credential: &Credential, feature: Feature) -> Res<()> {
    check_scopes(credential, feature.required_scopes().iter().copied())
}
