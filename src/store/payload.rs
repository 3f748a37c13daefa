//! # Secret Payload
//!
//! Opaque key/value payload of a secret record.
//!
//! Values are wiped from memory when the payload is dropped, and `Debug`
//! prints key names only so a payload can never leak into logs or error chains.

use std::collections::BTreeMap;
use std::fmt;
use zeroize::Zeroize;

/// Mapping from key to opaque bytes
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretData {
    entries: BTreeMap<String, Vec<u8>>,
}

impl SecretData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning `self` for chaining
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        if let Some(mut previous) = self.entries.insert(key.into(), value.into()) {
            previous.zeroize();
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for SecretData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Self::new();
        for (key, value) in iter {
            data.insert(key, value);
        }
        data
    }
}

impl Zeroize for SecretData {
    fn zeroize(&mut self) {
        for value in self.entries.values_mut() {
            value.zeroize();
        }
        self.entries.clear();
    }
}

impl Drop for SecretData {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for SecretData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretData")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
