//! Encrypted values on top of a [`Storage`] backend.

use super::Storage;
use crate::constants::EVENT_STORAGE_RESET;
use crate::crypto::{CryptoService, EncryptedPayload};
use crate::errors::{AppResult, StorageError};
use crate::telemetry::AuditSink;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Stores values as JSON-encoded [`EncryptedPayload`]s.
///
/// A value that cannot be parsed or decrypted reads as absent. This is the
/// normal outcome after a restart, because the key that sealed it is gone.
///
/// Backend calls may block on file locks, so they run on tokio's blocking
/// pool rather than on the async worker.
#[derive(Clone)]
pub struct SecureStorage {
    crypto: Arc<CryptoService>,
    storage: Arc<dyn Storage>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl fmt::Debug for SecureStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureStorage")
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl SecureStorage {
    pub fn new(crypto: Arc<CryptoService>, storage: Arc<dyn Storage>) -> Self {
        Self {
            crypto,
            storage,
            audit: None,
        }
    }

    /// Reports unreadable values to `sink`. Only the storage key is sent.
    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Encrypts `value` and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption is unavailable or the backend write fails.
    pub async fn set_value(&self, key: &str, value: &str) -> AppResult<()> {
        let payload = self.crypto.encrypt(value).await?;
        let serialized = payload.to_json().map_err(StorageError::from)?;
        let key = key.to_string();
        self.on_backend(move |storage| storage.set_item(&key, &serialized))
            .await
    }

    /// Reads and decrypts the value under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored or when the stored value is
    /// unreadable under the current key.
    ///
    /// # Errors
    ///
    /// Only backend read failures are errors.
    pub async fn get_value(&self, key: &str) -> AppResult<Option<String>> {
        let owned = key.to_string();
        let Some(raw) = self
            .on_backend(move |storage| storage.get_item(&owned))
            .await?
        else {
            return Ok(None);
        };

        let payload = match EncryptedPayload::from_json(&raw) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(key, "Stored value is not an encrypted payload: {}", e);
                self.report_reset(key, "malformed");
                return Ok(None);
            }
        };

        match self.crypto.decrypt(&payload).await {
            Some(value) => Ok(Some(value)),
            None => {
                debug!(key, "Stored value does not decrypt under the current key");
                self.report_reset(key, "undecryptable");
                Ok(None)
            }
        }
    }

    /// Like [`SecureStorage::get_value`], substituting `default` for a missing value.
    pub async fn get_or_default(&self, key: &str, default: &str) -> AppResult<String> {
        Ok(self
            .get_value(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    pub async fn remove_value(&self, key: &str) -> AppResult<()> {
        let key = key.to_string();
        self.on_backend(move |storage| storage.remove_item(&key))
            .await
    }

    async fn on_backend<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Storage) -> AppResult<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || op(storage.as_ref()))
            .await
            .map_err(|e| StorageError::Background(e.to_string()))?
    }

    fn report_reset(&self, key: &str, reason: &str) {
        if let Some(sink) = &self.audit {
            sink.emit(EVENT_STORAGE_RESET, json!({ "key": key, "reason": reason }));
        }
    }
}

/// One stored key bound to an in-memory value.
///
/// Reads come from memory. [`SecureValue::set`] updates memory immediately and
/// persists in a background task; a failed persist is logged and the visible
/// value is kept. [`SecureValue::load`] replaces the default with the stored
/// value unless the binding was closed or written to while the load was in
/// flight.
pub struct SecureValue {
    key: String,
    storage: SecureStorage,
    current: Arc<Mutex<String>>,
    alive: Arc<AtomicBool>,
    revision: Arc<AtomicU64>,
}

impl SecureValue {
    /// Binds `key`, showing `default` until a stored value is loaded.
    pub fn new(storage: SecureStorage, key: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            storage,
            current: Arc::new(Mutex::new(default.into())),
            alive: Arc::new(AtomicBool::new(true)),
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The visible value.
    pub fn get(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loads the stored value into memory. Returns whether it was applied.
    ///
    /// Missing, unreadable or failing reads leave the current value in place.
    pub async fn load(&self) -> bool {
        let started_at = self.revision.load(Ordering::SeqCst);
        let stored = match self.storage.get_value(&self.key).await {
            Ok(Some(value)) => value,
            Ok(None) => return false,
            Err(e) => {
                warn!(key = %self.key, "Failed to read stored value: {}", e);
                return false;
            }
        };

        if !self.alive.load(Ordering::SeqCst) {
            debug!(key = %self.key, "Binding closed during load; discarding result");
            return false;
        }
        if self.revision.load(Ordering::SeqCst) != started_at {
            debug!(key = %self.key, "Value changed during load; keeping newer value");
            return false;
        }

        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = stored;
        true
    }

    /// Shows `value` immediately and persists it in the background.
    ///
    /// Must be called within a tokio runtime. The returned handle completes
    /// when the write has finished or failed.
    pub fn set(&self, value: impl Into<String>) -> JoinHandle<()> {
        let value = value.into();
        self.revision.fetch_add(1, Ordering::SeqCst);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = value.clone();

        let storage = self.storage.clone();
        let key = self.key.clone();
        tokio::spawn(async move {
            if let Err(e) = storage.set_value(&key, &value).await {
                warn!(key = %key, "Failed to persist value; keeping it in memory only: {}", e);
            }
        })
    }

    /// Detaches the binding. Loads still in flight will not apply their result.
    pub fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        !self.alive.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::mpsc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Memory storage whose first read blocks until the test releases it.
    struct GatedStorage {
        inner: MemoryStorage,
        entered: Mutex<Option<oneshot::Sender<()>>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedStorage {
        fn new() -> (Arc<Self>, oneshot::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = oneshot::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let storage = Arc::new(Self {
                inner: MemoryStorage::new(),
                entered: Mutex::new(Some(entered_tx)),
                release: Mutex::new(release_rx),
            });
            (storage, entered_rx, release_tx)
        }
    }

    impl Storage for GatedStorage {
        fn get_item(&self, key: &str) -> AppResult<Option<String>> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                let _ = entered.send(());
                let _ = self
                    .release
                    .lock()
                    .unwrap()
                    .recv_timeout(Duration::from_secs(5));
            }
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> AppResult<()> {
            self.inner.remove_item(key)
        }
    }

    fn secure() -> (SecureStorage, Arc<MemoryStorage>) {
        let backend = Arc::new(MemoryStorage::new());
        let storage = SecureStorage::new(Arc::new(CryptoService::new()), backend.clone());
        (storage, backend)
    }

    #[tokio::test]
    async fn test_stored_form_is_encrypted_json() {
        let (storage, backend) = secure();
        storage.set_value("iban", "DE89 3704 0044 0532 0130 00").await.unwrap();

        let raw = backend.get_item("iban").unwrap().unwrap();
        assert!(!raw.contains("3704"));
        let payload = EncryptedPayload::from_json(&raw).unwrap();
        assert!(!payload.iv.is_empty());

        assert_eq!(
            storage.get_value("iban").await.unwrap().as_deref(),
            Some("DE89 3704 0044 0532 0130 00")
        );
    }

    #[tokio::test]
    async fn test_malformed_value_reads_as_default() {
        let (storage, backend) = secure();
        backend.set_item("draft", "plain text from an older build").unwrap();

        assert_eq!(storage.get_value("draft").await.unwrap(), None);
        assert_eq!(storage.get_or_default("draft", "").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_set_updates_visible_value_immediately() {
        let (storage, _backend) = secure();
        let value = SecureValue::new(storage.clone(), "note", "");

        let handle = value.set("typed text");
        assert_eq!(value.get(), "typed text");

        handle.await.unwrap();
        assert_eq!(
            storage.get_value("note").await.unwrap().as_deref(),
            Some("typed text")
        );
    }

    #[tokio::test]
    async fn test_closed_binding_ignores_load() {
        let (storage, _backend) = secure();
        storage.set_value("note", "persisted").await.unwrap();

        let value = SecureValue::new(storage, "note", "default");
        value.close();

        assert!(!value.load().await);
        assert!(value.is_closed());
        assert_eq!(value.get(), "default");
    }

    #[tokio::test]
    async fn test_load_keeps_value_written_during_read() {
        let (backend, entered, release) = GatedStorage::new();
        let storage = SecureStorage::new(Arc::new(CryptoService::new()), backend);
        storage.set_value("note", "persisted").await.unwrap();

        let value = Arc::new(SecureValue::new(storage.clone(), "note", "default"));
        let loading = tokio::spawn({
            let value = Arc::clone(&value);
            async move { value.load().await }
        });

        entered.await.unwrap();
        value.set("newer").await.unwrap();
        release.send(()).unwrap();

        assert!(!loading.await.unwrap());
        assert_eq!(value.get(), "newer");
        assert_eq!(
            storage.get_value("note").await.unwrap().as_deref(),
            Some("newer")
        );
    }

    #[tokio::test]
    async fn test_load_applies_value_when_nothing_changed() {
        let (backend, entered, release) = GatedStorage::new();
        let storage = SecureStorage::new(Arc::new(CryptoService::new()), backend);
        storage.set_value("note", "persisted").await.unwrap();

        let value = Arc::new(SecureValue::new(storage, "note", "default"));
        let loading = tokio::spawn({
            let value = Arc::clone(&value);
            async move { value.load().await }
        });

        entered.await.unwrap();
        release.send(()).unwrap();

        assert!(loading.await.unwrap());
        assert_eq!(value.get(), "persisted");
    }

    #[tokio::test]
    async fn test_blocked_backend_does_not_stall_runtime() {
        let (backend, entered, release) = GatedStorage::new();
        let storage = SecureStorage::new(Arc::new(CryptoService::new()), backend);

        let reading = tokio::spawn({
            let storage = storage.clone();
            async move { storage.get_value("draft").await }
        });
        entered.await.unwrap();

        // The single runtime thread is still free while the read is held.
        let other = tokio::spawn(async {
            tokio::task::yield_now().await;
            "ran"
        });
        assert_eq!(other.await.unwrap(), "ran");

        release.send(()).unwrap();
        assert_eq!(reading.await.unwrap().unwrap(), None);
    }
}
