//! Opaque per-provider credential bag.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::errors::{FlightDataError, Result};

/// Key/value credentials for one provider instance.
///
/// Values never appear in `Debug` output; only key names do.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ProviderCredentials {
    values: BTreeMap<String, String>,
}

impl ProviderCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a credential.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Collect every environment variable starting with `prefix`.
    ///
    /// `FS_AMADEUS_CLIENT_ID` with prefix `FS_AMADEUS_` becomes `client_id`.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_pairs(std::env::vars(), prefix)
    }

    fn from_pairs(vars: impl IntoIterator<Item = (String, String)>, prefix: &str) -> Self {
        let values = vars
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_ascii_lowercase(), value))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Fetch a mandatory credential or fail with a configuration error.
    pub fn require(&self, provider: &str, key: &str) -> Result<String> {
        self.get(key).map(str::to_string).ok_or_else(|| {
            FlightDataError::configuration(provider, format!("missing credential '{}'", key))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}
