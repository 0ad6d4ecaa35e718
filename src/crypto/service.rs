//! Ephemeral AES-256-GCM key management and text encryption.
//!
//! A [`CryptoService`] owns exactly one key for its lifetime. The key is
//! created lazily, never persisted, and dies with the service. Anything
//! encrypted under it becomes unreadable once the service (or its key) is
//! gone, which is how a restart invalidates previously stored values.

use crate::constants::{IV_LEN, KEY_LEN};
use crate::crypto::EncryptedPayload;
use crate::errors::{AppResult, CryptoError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroizing;

/// A source of cryptographically secure random bytes.
///
/// The service draws both key material and IVs from it. The default is the
/// operating system CSPRNG.
pub trait EntropySource: Send + Sync {
    /// Fills `dest` entirely with random bytes.
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

/// Entropy from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

/// An opaque symmetric key.
///
/// The key material lives only inside the cipher instance; it cannot be read
/// back out. The `id` is a random label for logs and identity checks.
pub struct EncryptionKey {
    id: Uuid,
    cipher: Aes256Gcm,
}

impl EncryptionKey {
    /// Random label identifying this key instance.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("id", &self.id)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Encrypts and decrypts short text values under a single ephemeral key.
///
/// # Example
///
/// ```no_run
/// use nis2_shield::crypto::CryptoService;
///
/// # async fn run() -> nis2_shield::AppResult<()> {
/// let crypto = CryptoService::new();
/// let payload = crypto.encrypt("sensitive data here").await?;
/// assert_eq!(crypto.decrypt(&payload).await.as_deref(), Some("sensitive data here"));
/// # Ok(())
/// # }
/// ```
pub struct CryptoService {
    key: Mutex<Option<Arc<EncryptionKey>>>,
    entropy: Box<dyn EntropySource>,
}

impl Default for CryptoService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CryptoService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoService").finish_non_exhaustive()
    }
}

impl CryptoService {
    /// Creates a service backed by the operating system CSPRNG. No key exists yet.
    pub fn new() -> Self {
        Self::with_entropy(OsEntropy)
    }

    /// Creates a service drawing randomness from `entropy`.
    pub fn with_entropy(entropy: impl EntropySource + 'static) -> Self {
        Self {
            key: Mutex::new(None),
            entropy: Box::new(entropy),
        }
    }

    /// Returns the service key, generating it on first use.
    ///
    /// Creation happens under the key lock, so callers racing on an empty
    /// service all observe the same key.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyUnavailable` if the entropy source fails. The
    /// service stays keyless and a later call will try again.
    pub async fn get_or_create_key(&self) -> AppResult<Arc<EncryptionKey>> {
        let mut slot = self.key.lock().await;
        if let Some(key) = slot.as_ref() {
            return Ok(Arc::clone(key));
        }

        let mut material = Zeroizing::new([0u8; KEY_LEN]);
        self.entropy
            .fill(&mut material[..])
            .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&material[..])
            .map_err(|e| CryptoError::KeyUnavailable(e.to_string()))?;

        let key = Arc::new(EncryptionKey {
            id: Uuid::new_v4(),
            cipher,
        });
        info!(key_id = %key.id, "Generated ephemeral encryption key");
        *slot = Some(Arc::clone(&key));
        Ok(key)
    }

    /// Whether a key has been generated and not discarded.
    pub async fn has_key(&self) -> bool {
        self.key.lock().await.is_some()
    }

    /// Drops the current key. The next operation generates a fresh one, and
    /// payloads sealed under the old key stop decrypting.
    pub async fn discard_key(&self) {
        if let Some(key) = self.key.lock().await.take() {
            debug!(key_id = %key.id, "Discarded encryption key");
        }
    }

    /// Encrypts `plaintext` under the service key with a fresh random IV.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::KeyUnavailable` if no key can be created, or
    /// `CryptoError::EncryptionFailed` if the IV cannot be drawn or sealing fails.
    pub async fn encrypt(&self, plaintext: &str) -> AppResult<EncryptedPayload> {
        let key = self.get_or_create_key().await?;

        let mut iv = [0u8; IV_LEN];
        self.entropy
            .fill(&mut iv)
            .map_err(|e| CryptoError::EncryptionFailed(format!("IV generation failed: {}", e)))?;

        let ciphertext = key
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(EncryptedPayload::from_parts(&iv, &ciphertext))
    }

    /// Decrypts a payload sealed by this service's current key.
    ///
    /// Returns `None` for anything that does not authenticate under the current
    /// key: another key's payload, tampered data, malformed encoding, or
    /// non-UTF-8 plaintext. Callers treat `None` as "no stored value".
    pub async fn decrypt(&self, payload: &EncryptedPayload) -> Option<String> {
        let key = match self.get_or_create_key().await {
            Ok(key) => key,
            Err(e) => {
                debug!("Cannot decrypt without a key: {}", e);
                return None;
            }
        };

        let (iv, data) = match payload.decode() {
            Ok(parts) => parts,
            Err(e) => {
                debug!("Rejected malformed payload: {}", e);
                return None;
            }
        };

        let plaintext = match key.cipher.decrypt(Nonce::from_slice(&iv), data.as_slice()) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(_) => {
                debug!(key_id = %key.id, "Payload did not authenticate under current key");
                return None;
            }
        };

        match std::str::from_utf8(&plaintext) {
            Ok(text) => Some(text.to_string()),
            Err(_) => {
                debug!("Decrypted payload is not UTF-8");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Entropy that can be switched off to simulate a missing platform CSPRNG.
    struct SwitchableEntropy {
        available: Arc<AtomicBool>,
    }

    impl EntropySource for SwitchableEntropy {
        fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
            if self.available.load(Ordering::SeqCst) {
                OsRng.try_fill_bytes(dest)
            } else {
                Err(rand::Error::new(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "entropy unavailable",
                )))
            }
        }
    }

    #[tokio::test]
    async fn test_key_is_created_lazily_and_cached() {
        let crypto = CryptoService::new();
        assert!(!crypto.has_key().await);

        let first = crypto.get_or_create_key().await.unwrap();
        let second = crypto.get_or_create_key().await.unwrap();

        assert!(crypto.has_key().await);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.id(), second.id());
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_key() {
        let crypto = Arc::new(CryptoService::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let crypto = Arc::clone(&crypto);
                tokio::spawn(async move { crypto.get_or_create_key().await.unwrap().id() })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let crypto = CryptoService::new();
        for text in ["", "hello", "sensitive data here", "ünïcödé ✓ 日本語"] {
            let payload = crypto.encrypt(text).await.unwrap();
            assert_eq!(crypto.decrypt(&payload).await.as_deref(), Some(text));
        }
    }

    #[tokio::test]
    async fn test_discarded_key_fails_closed() {
        let crypto = CryptoService::new();
        let payload = crypto.encrypt("sensitive data here").await.unwrap();

        crypto.discard_key().await;

        assert_eq!(crypto.decrypt(&payload).await, None);
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_returns_none() {
        let crypto = CryptoService::new();
        let payload = crypto.encrypt("balance: 100").await.unwrap();

        let (iv, mut data) = payload.decode().unwrap();
        data[0] ^= 0x01;
        let tampered = EncryptedPayload::from_parts(&iv, &data);

        assert_eq!(crypto.decrypt(&tampered).await, None);
    }

    #[tokio::test]
    async fn test_key_creation_failure_is_reported_and_retryable() {
        let available = Arc::new(AtomicBool::new(false));
        let crypto = CryptoService::with_entropy(SwitchableEntropy {
            available: Arc::clone(&available),
        });

        let err = crypto.encrypt("value").await.unwrap_err();
        assert!(matches!(
            err,
            crate::errors::AppError::Crypto(CryptoError::KeyUnavailable(_))
        ));
        assert!(!crypto.has_key().await);

        available.store(true, Ordering::SeqCst);
        let payload = crypto.encrypt("value").await.unwrap();
        assert_eq!(crypto.decrypt(&payload).await.as_deref(), Some("value"));
    }

    #[test]
    fn test_key_debug_does_not_leak_material() {
        let key = EncryptionKey {
            id: Uuid::nil(),
            cipher: Aes256Gcm::new_from_slice(&[0x42; KEY_LEN]).unwrap(),
        };
        let output = format!("{:?}", key);
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("42"));
    }
}
