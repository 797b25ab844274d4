//! The key-value settings store the relay reads its policy from.
//!
//! Settings come from an optional YAML file whose top level maps keys to scalars, with individual
//! keys overridable from the command line. Every value is kept as a string; the keys are read as
//! needed by whoever cares about them.

use std::{
    collections::HashMap,
    fs,
    io::{self, ErrorKind},
    path::Path,
};

use serde::Deserialize;
use thiserror::Error;

/// `yes` selects the filtering DNS-over-HTTPS resolver.
pub const BLOCK_PORN_KEY: &str = "BlockPorn";

/// A comma-separated list of country codes that egress candidates are filtered by.
pub const COUNTRIES_KEY: &str = "Countries";

/// Where to fetch the list of egress candidates from.
pub const PROXIES_URI_KEY: &str = "ProxiesUri";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not read settings file {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("Malformed settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<SettingsError> for io::Error {
    fn from(value: SettingsError) -> Self {
        let kind = match &value {
            SettingsError::Read { source, .. } => source.kind(),
            SettingsError::Yaml(_) => ErrorKind::InvalidData,
        };

        io::Error::new(kind, value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SettingValue {
    Text(String),
    Flag(bool),
    Number(serde_yaml::Number),
}

impl SettingValue {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Flag(flag) => flag.to_string(),
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from YAML text. Keys with a null value are left unset.
    pub fn from_yaml(text: &str) -> Result<Self, SettingsError> {
        let parsed: Option<HashMap<String, Option<SettingValue>>> = serde_yaml::from_str(text)?;

        let values = parsed
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| Some((key, value?.into_string())))
            .collect();

        Ok(Self { values })
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_yaml(&text)
    }

    /// Builds the settings the relay runs with: the file's contents if there is one, then each
    /// override in order.
    pub fn load(file: Option<&Path>, overrides: &[(String, String)]) -> Result<Self, SettingsError> {
        let mut settings = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::new(),
        };

        for (key, value) in overrides {
            settings.set(key.clone(), value.clone());
        }

        Ok(settings)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }

    /// Whether the setting is present and set to exactly `yes`.
    pub fn is_yes(&self, key: &str) -> bool {
        self.get(key) == Some("yes")
    }
}
