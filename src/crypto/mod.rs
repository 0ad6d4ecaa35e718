//! Cryptographic operations for encrypted local persistence.
//!
//! This module provides an ephemeral-key AES-256-GCM service and the portable
//! payload format it produces.
//!
//! # Module Structure
//!
//! - `service`: Key lifecycle plus encrypt/decrypt over UTF-8 text
//! - `payload`: The base64 `{iv, data}` pair and its JSON form
//!
//! # Example
//!
//! ```no_run
//! use nis2_shield::crypto::CryptoService;
//!
//! # async fn run() -> nis2_shield::AppResult<()> {
//! let crypto = CryptoService::new();
//! let payload = crypto.encrypt("Secret value").await?;
//! let stored = payload.to_json().expect("payload serializes");
//!
//! // Simulate a restart: the key is gone, so the stored value is unreadable.
//! crypto.discard_key().await;
//! let reloaded = nis2_shield::crypto::EncryptedPayload::from_json(&stored).expect("valid json");
//! assert_eq!(crypto.decrypt(&reloaded).await, None);
//! # Ok(())
//! # }
//! ```

pub mod payload;
pub mod service;

// Re-export commonly used types
pub use self::payload::EncryptedPayload;
pub use self::service::{CryptoService, EncryptionKey, EntropySource, OsEntropy};
