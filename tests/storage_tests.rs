//! Integration tests for encrypted storage over the file and memory backends.


use nis2_shield::crypto::{CryptoService, EncryptedPayload};
use nis2_shield::storage::{FileStorage, MemoryStorage, SecureStorage, SecureValue, Storage};
use std::sync::Arc;
use tempfile::tempdir;
use test_helpers::RecordingSink;

fn file_backed(path: &std::path::Path) -> SecureStorage {
    SecureStorage::new(
        Arc::new(CryptoService::new()),
        Arc::new(FileStorage::new(path)),
    )
}

#[tokio::test]
async fn test_value_survives_in_same_lifetime() {
    let dir = tempdir().unwrap();
    let storage = file_backed(&dir.path().join("storage.json"));

    storage.set_value("draft", "sensitive data here").await.unwrap();

    assert_eq!(
        storage.get_value("draft").await.unwrap().as_deref(),
        Some("sensitive data here")
    );
}

#[tokio::test]
async fn test_reload_reads_default_but_keeps_raw_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");

    file_backed(&path)
        .set_value("draft", "sensitive data here")
        .await
        .unwrap();

    // Next page load: storage persists, the key does not.
    let sink = Arc::new(RecordingSink::default());
    let reloaded = file_backed(&path).with_audit(sink.clone());

    assert_eq!(
        reloaded.get_or_default("draft", "empty").await.unwrap(),
        "empty"
    );

    let raw = FileStorage::new(&path).get_item("draft").unwrap().unwrap();
    assert!(EncryptedPayload::from_json(&raw).is_ok());
    assert!(!raw.contains("sensitive"));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "SECURE_STORAGE_RESET");
    assert_eq!(events[0].1["key"], "draft");
    assert_eq!(events[0].1["reason"], "undecryptable");
}

#[tokio::test]
async fn test_overwrite_after_reload_is_readable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");

    file_backed(&path).set_value("note", "old").await.unwrap();

    let reloaded = file_backed(&path);
    assert_eq!(reloaded.get_value("note").await.unwrap(), None);
    reloaded.set_value("note", "new").await.unwrap();
    assert_eq!(
        reloaded.get_value("note").await.unwrap().as_deref(),
        Some("new")
    );
}

#[tokio::test]
async fn test_remove_value() {
    let storage = SecureStorage::new(
        Arc::new(CryptoService::new()),
        Arc::new(MemoryStorage::new()),
    );

    storage.set_value("token", "abc").await.unwrap();
    storage.remove_value("token").await.unwrap();

    assert_eq!(storage.get_value("token").await.unwrap(), None);
    // Removing a missing key is not an error.
    storage.remove_value("token").await.unwrap();
}

#[tokio::test]
async fn test_keys_are_independent() {
    let dir = tempdir().unwrap();
    let storage = file_backed(&dir.path().join("storage.json"));

    storage.set_value("a", "first").await.unwrap();
    storage.set_value("b", "second").await.unwrap();

    assert_eq!(storage.get_value("a").await.unwrap().as_deref(), Some("first"));
    assert_eq!(storage.get_value("b").await.unwrap().as_deref(), Some("second"));
}

#[tokio::test]
async fn test_secure_value_loads_stored_value() {
    let storage = SecureStorage::new(
        Arc::new(CryptoService::new()),
        Arc::new(MemoryStorage::new()),
    );
    storage.set_value("iban", "DE89").await.unwrap();

    let value = SecureValue::new(storage, "iban", "");
    assert_eq!(value.get(), "");
    assert!(value.load().await);
    assert_eq!(value.get(), "DE89");
    assert_eq!(value.key(), "iban");
}

#[tokio::test]
async fn test_secure_value_keeps_default_after_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");
    file_backed(&path).set_value("iban", "DE89").await.unwrap();

    let value = SecureValue::new(file_backed(&path), "iban", "unset");
    assert!(!value.load().await);
    assert_eq!(value.get(), "unset");
}

#[tokio::test]
async fn test_secure_value_set_persists_in_background() {
    let dir = tempdir().unwrap();
    let storage = file_backed(&dir.path().join("storage.json"));
    let value = SecureValue::new(storage.clone(), "note", "");

    let pending = value.set("typed");
    assert_eq!(value.get(), "typed");
    pending.await.unwrap();

    assert_eq!(
        storage.get_value("note").await.unwrap().as_deref(),
        Some("typed")
    );
}

#[tokio::test]
async fn test_failed_persist_keeps_visible_value() {
    let dir = tempdir().unwrap();
    // A directory where the storage file should be makes every write fail.
    let blocked = dir.path().join("storage.json");
    std::fs::create_dir_all(blocked.join("occupied")).unwrap();

    let value = SecureValue::new(file_backed(&blocked), "note", "");
    value.set("typed").await.unwrap();

    assert_eq!(value.get(), "typed");
}
