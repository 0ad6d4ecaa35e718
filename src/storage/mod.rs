//! Key-value text storage and its encrypted front end.
//!
//! Backends implement the three-call [`Storage`] contract of browser web
//! storage. Two scopes exist: [`MemoryStorage`] lives as long as the process
//! (session scope) and [`FileStorage`] survives restarts (persistent scope).
//! [`SecureStorage`] encrypts values with a [`crate::crypto::CryptoService`]
//! before they reach a backend, and [`SecureValue`] binds one stored key to an
//! in-memory value that updates immediately and persists in the background.

pub mod file;
pub mod memory;
pub mod secure;

use crate::errors::AppResult;

pub use self::file::FileStorage;
pub use self::memory::MemoryStorage;
pub use self::secure::{SecureStorage, SecureValue};

/// A string-to-string store.
pub trait Storage: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: &str) -> AppResult<()>;

    /// Deletes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> AppResult<()>;
}
