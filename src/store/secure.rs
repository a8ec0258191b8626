// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Key-value storage backends for session secrets.

use crate::error::Result;
use dashmap::DashMap;

/// A small string key-value store for secrets.
///
/// Batch operations apply all entries or none, so a multi-field record is
/// never left half written.
pub trait SecureStore: Send + Sync {
    /// Read a value, `None` if the key was never written or was removed.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write several entries at once.
    fn put_all(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove several keys at once. Missing keys are ignored.
    fn remove_all(&self, keys: &[&str]) -> Result<()>;

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_all(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_all(&[key])
    }
}

/// In-process store, for tests and sessions that must not touch disk.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SecureStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            self.entries.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}
