//! Implementations of the `shield` subcommands.

use crate::config::Config;
use crate::crypto::CryptoService;
use crate::errors::{AppResult, StorageError};
use crate::session::{SessionGuardian, Signal, Transition};
use crate::storage::{FileStorage, MemoryStorage, SecureStorage, Storage};
use crate::telemetry::{SessionAudit, TelemetryClient};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// Encrypts `text` and prints the payload JSON.
pub async fn seal(text: &str) -> AppResult<()> {
    let crypto = CryptoService::new();
    let payload = crypto.encrypt(text).await?;
    println!("{}", payload.to_json().map_err(StorageError::from)?);
    Ok(())
}

fn secure_storage(config: &Config, backend: Arc<dyn Storage>) -> SecureStorage {
    SecureStorage::new(Arc::new(CryptoService::new()), backend)
        .with_audit(Arc::new(TelemetryClient::from_config(config)))
}

/// Stores `value` under `key` and verifies it reads back.
pub async fn store(config: &Config, key: &str, value: &str, session: bool) -> AppResult<()> {
    let backend: Arc<dyn Storage> = if session {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(FileStorage::new(&config.storage_path))
    };
    let storage = secure_storage(config, backend);

    storage.set_value(key, value).await?;
    let read_back = storage.get_value(key).await?;
    let scope = if session { "session" } else { "persistent" };

    if read_back.as_deref() == Some(value) {
        info!(key, scope, "Stored encrypted value");
        println!("stored '{}' ({} scope, verified)", key, scope);
    } else {
        warn!(key, scope, "Stored value did not read back");
        println!("stored '{}' ({} scope, read-back mismatch)", key, scope);
    }
    Ok(())
}

/// Reads `key` from persistent storage with this process's key.
pub async fn recall(config: &Config, key: &str) -> AppResult<()> {
    let backend = Arc::new(FileStorage::new(&config.storage_path));
    let has_raw = backend.get_item(key)?.is_some();
    let storage = secure_storage(config, backend);

    match storage.get_value(key).await? {
        Some(value) => println!("{}: {}", key, value),
        None if has_raw => println!(
            "{}: <default> (stored value was sealed by an earlier session key)",
            key
        ),
        None => println!("{}: <default> (nothing stored)", key),
    }
    Ok(())
}

/// Runs a guardian fed by `input`, one signal per line, until EOF or `quit`.
///
/// Besides signal names, `force` forces the session active and
/// `timeout <minutes>` reconfigures the idle timeout. Both the
/// `timeout_minutes` override and `timeout` lines are held to the bounds of
/// [`Config::validate`].
///
/// # Errors
///
/// Returns `AppError::Config` if `timeout_minutes` is out of bounds.
pub async fn guard<R>(config: &Config, timeout_minutes: Option<u64>, input: R) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let config = match timeout_minutes {
        Some(minutes) => config.with_idle_timeout_minutes(minutes)?,
        None => config.clone(),
    };

    let mut guardian = SessionGuardian::new(config.guardian_settings());
    guardian.on_transition(|event| match event.transition {
        Transition::BecameIdle => println!("idle"),
        Transition::BecameActive => println!("active"),
    });
    SessionAudit::new(Arc::new(TelemetryClient::from_config(&config))).attach(&guardian);
    guardian.start()?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        if line == "force" {
            guardian.force_active();
            continue;
        }
        if let Some(raw) = line.strip_prefix("timeout ") {
            let raw = raw.trim();
            match raw.parse::<u64>() {
                Ok(minutes) => match config.with_idle_timeout_minutes(minutes) {
                    Ok(updated) => guardian.set_timeout(updated.idle_timeout()),
                    Err(e) => eprintln!("invalid timeout: {}: {}", raw, e),
                },
                Err(e) => eprintln!("invalid timeout: {}: {}", raw, e),
            }
            continue;
        }
        match line.parse::<Signal>() {
            Ok(signal) => guardian.signal(signal),
            Err(e) => eprintln!("{}", e),
        }
    }

    guardian.stop().await;
    Ok(())
}
