// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encrypted-at-rest file store for session tokens.
//!
//! Each value is sealed with AES-256-GCM under a key derived (HKDF-SHA256)
//! from the configured store secret. The entry name is bound as additional
//! authenticated data, so a ciphertext moved under another name will not
//! decrypt. The file itself is a JSON object of
//! `name -> base64(nonce || ciphertext || tag)`.

use crate::error::{AppError, Result};
use crate::store::SecureStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hkdf::Hkdf;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

const HKDF_SALT: &[u8] = b"cgm-client/token-store/v1";
const HKDF_INFO: &[u8] = b"aes-256-gcm value key";

/// File-backed [`SecureStore`] with per-value authenticated encryption.
pub struct EncryptedFileStore {
    path: PathBuf,
    key: LessSafeKey,
    rng: SystemRandom,
    /// Sealed entries as last written to disk.
    entries: Mutex<BTreeMap<String, String>>,
}

impl EncryptedFileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>, secret: &[u8]) -> Result<Self> {
        let path = path.into();
        let key = derive_key(secret)?;

        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    // Overwritten by the next write.
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Token store file is corrupt, starting with no session"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        Ok(Self {
            path,
            key,
            rng: SystemRandom::new(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(&self, name: &str, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Crypto("Random nonce generation failed".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(name.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| AppError::Crypto(format!("Failed to encrypt {name}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);
        Ok(BASE64.encode(blob))
    }

    fn unseal(&self, name: &str, encoded: &str) -> Result<String> {
        let mut blob = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Crypto(format!("Base64 decode of {name} failed: {e}")))?;

        if blob.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(AppError::Crypto(format!("Ciphertext for {name} is truncated")));
        }

        let mut ciphertext = blob.split_off(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(&blob)
            .map_err(|_| AppError::Crypto(format!("Bad nonce for {name}")))?;

        let plaintext = self
            .key
            .open_in_place(nonce, Aad::from(name.as_bytes()), &mut ciphertext)
            .map_err(|_| AppError::Crypto(format!("Failed to decrypt {name}")))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| AppError::Crypto(format!("UTF-8 decode of {name} failed: {e}")))
    }

    /// Write the whole map to a temp file and rename it into place.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| AppError::Storage(format!("Failed to serialize token store: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        let write_err =
            |e: std::io::Error| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e));

        // A leftover temp file would keep its old mode.
        match fs::remove_file(&tmp) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(write_err(e)),
            _ => {}
        }

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp).map_err(write_err)?;
        file.write_all(&json).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::Storage(format!("Failed to replace {}: {}", self.path.display(), e))
        })
    }
}

impl SecureStore for EncryptedFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let sealed = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.get(key).cloned()
        };
        sealed.map(|s| self.unseal(key, &s)).transpose()
    }

    fn put_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut current = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        for (key, value) in entries {
            next.insert((*key).to_string(), self.seal(key, value)?);
        }
        self.persist(&next)?;
        *current = next;
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut current = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.iter().any(|k| current.contains_key(*k)) {
            return Ok(());
        }
        let mut next = current.clone();
        for key in keys {
            next.remove(*key);
        }
        self.persist(&next)?;
        *current = next;
        Ok(())
    }
}

fn derive_key(secret: &[u8]) -> Result<LessSafeKey> {
    if secret.is_empty() {
        return Err(AppError::Crypto("Store secret must not be empty".to_string()));
    }

    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret);
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .map_err(|e| AppError::Crypto(format!("Key derivation failed: {e}")))?;

    let unbound = UnboundKey::new(&AES_256_GCM, &okm)
        .map_err(|_| AppError::Crypto("Derived key has the wrong length".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}
