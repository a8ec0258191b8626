// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session persistence: secure key-value backends and the token store.

pub mod encrypted_file;
pub mod secure;
pub mod tokens;

pub use encrypted_file::EncryptedFileStore;
pub use secure::{MemoryStore, SecureStore};
pub use tokens::TokenStore;
