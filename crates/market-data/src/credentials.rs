//! Named API credentials supplied by the host application.
//!
//! The pipeline never loads or stores secrets itself; the caller hands it a
//! map of named keys and each adapter reads the single key it needs at
//! extraction start.

use std::collections::HashMap;

use crate::errors::MarketDataError;

/// Read-only map of named API keys.
#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    keys: HashMap<String, String>,
}

impl CredentialStore {
    /// An empty store, for vendors that require no credentials or for
    /// offline tests.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a key by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.keys.get(name).map(String::as_str)
    }

    /// Look up a key that the adapter cannot work without.
    ///
    /// # Errors
    ///
    /// Returns [`MarketDataError::MissingCredential`] when the key is
    /// absent or blank.
    pub fn get_required(&self, name: &str) -> Result<&str, MarketDataError> {
        match self.get(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(MarketDataError::MissingCredential {
                key: name.to_string(),
            }),
        }
    }
}

impl From<HashMap<String, String>> for CredentialStore {
    fn from(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for CredentialStore {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self {
            keys: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_required_present() {
        let store = CredentialStore::from([("polygon_api_key", "secret")]);
        assert_eq!(store.get_required("polygon_api_key").unwrap(), "secret");
    }

    #[test]
    fn test_get_required_absent() {
        let store = CredentialStore::empty();
        let err = store.get_required("polygon_api_key").unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::MissingCredential { key } if key == "polygon_api_key"
        ));
    }

    #[test]
    fn test_get_required_blank_counts_as_absent() {
        let store = CredentialStore::from([("polygon_api_key", "  ")]);
        assert!(store.get_required("polygon_api_key").is_err());
    }

    #[test]
    fn test_get_optional() {
        let store = CredentialStore::from([("marketdata_app_api_key", "token")]);
        assert_eq!(store.get("marketdata_app_api_key"), Some("token"));
        assert_eq!(store.get("other"), None);
    }
}
