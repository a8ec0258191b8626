// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token store.
//!
//! Persists the current [`TokenSet`] through a [`SecureStore`] and mirrors it
//! in a `watch` channel for observers. All mutations take one writer lock,
//! write the backend first and publish second, so the mirror never shows a
//! value the backend does not hold.

use crate::error::Result;
use crate::models::{TokenSet, DEFAULT_TOKEN_TYPE};
use crate::store::{MemoryStore, SecureStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const TOKEN_TYPE_KEY: &str = "token_type";

/// Shared, thread-safe holder of the session tokens.
pub struct TokenStore {
    backend: Arc<dyn SecureStore>,
    lock: Mutex<()>,
    mirror: watch::Sender<Option<TokenSet>>,
}

impl TokenStore {
    /// Wrap a backend and seed the mirror from whatever it already holds.
    pub fn new(backend: Arc<dyn SecureStore>) -> Self {
        let initial = read_persisted(backend.as_ref());
        if initial.is_some() {
            tracing::debug!("Restored session tokens from storage");
        }
        let (mirror, _) = watch::channel(initial);
        Self {
            backend,
            lock: Mutex::new(()),
            mirror,
        }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist all three fields and publish the new set.
    pub fn save(&self, tokens: &TokenSet) -> Result<()> {
        let _guard = self.guard();
        self.backend.put_all(&[
            (ACCESS_TOKEN_KEY, tokens.access_token.as_str()),
            (REFRESH_TOKEN_KEY, tokens.refresh_token.as_str()),
            (TOKEN_TYPE_KEY, tokens.token_type.as_str()),
        ])?;
        self.mirror.send_replace(Some(tokens.clone()));
        Ok(())
    }

    /// The persisted set, or `None` without an access/refresh pair.
    pub fn get(&self) -> Option<TokenSet> {
        let _guard = self.guard();
        read_persisted(self.backend.as_ref())
    }

    /// Replace only the access token. Without a stored set this does nothing.
    pub fn update_access_token(&self, access_token: &str) -> Result<()> {
        let _guard = self.guard();
        let Some(mut tokens) = read_persisted(self.backend.as_ref()) else {
            tracing::debug!("No stored session, ignoring access token update");
            return Ok(());
        };

        self.backend.put(ACCESS_TOKEN_KEY, access_token)?;
        tokens.access_token = access_token.to_string();
        self.mirror.send_replace(Some(tokens));
        Ok(())
    }

    /// Erase all fields and publish "no tokens". Safe to repeat.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        self.backend
            .remove_all(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_TYPE_KEY])?;
        self.mirror.send_replace(None);
        Ok(())
    }

    /// Whether an access token is persisted. Local check only; the server
    /// may already have revoked it.
    pub fn is_authenticated(&self) -> bool {
        let _guard = self.guard();
        matches!(self.backend.get(ACCESS_TOKEN_KEY), Ok(Some(t)) if !t.is_empty())
    }

    /// Latest published set.
    pub fn current(&self) -> Option<TokenSet> {
        self.mirror.borrow().clone()
    }

    /// Access token attached to outgoing requests.
    pub fn access_token(&self) -> Option<String> {
        self.mirror
            .borrow()
            .as_ref()
            .map(|t| t.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.mirror
            .borrow()
            .as_ref()
            .map(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty())
    }

    /// Observe every published change.
    pub fn subscribe(&self) -> watch::Receiver<Option<TokenSet>> {
        self.mirror.subscribe()
    }
}

/// Read the three fields. Unreadable values count as absent.
fn read_persisted(backend: &dyn SecureStore) -> Option<TokenSet> {
    let read = |key: &str| match backend.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Unreadable session value, treating as absent");
            None
        }
    };

    let access_token = read(ACCESS_TOKEN_KEY)?;
    let refresh_token = read(REFRESH_TOKEN_KEY)?;
    let token_type = read(TOKEN_TYPE_KEY)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

    Some(TokenSet {
        access_token,
        refresh_token,
        token_type,
    })
}
