/*!
# nis2-shield

nis2-shield is a client-side security toolkit for applications that must keep an
audit trail under NIS2. It detects idle sessions so they can be terminated, keeps
locally stored values encrypted under a key that never outlives the process, and
forwards session and crash events to an audit endpoint.

## Core Features

- Idle/active session tracking from interaction and visibility signals
- AES-256-GCM encryption of stored text under an ephemeral in-memory key
- Session-scoped and persistent key-value storage with an encrypted front end
- Fire-and-forget audit telemetry and crash reporting

## Architecture

- `crypto`: Ephemeral key lifecycle and the `{iv, data}` payload format
- `session`: The idle state machine and the task that drives it
- `storage`: Storage backends, encrypted storage and two-stage value bindings
- `telemetry`: Audit events, HTTP delivery, crash reports, session auditing
- `config`: Configuration loading and validation
- `errors`: Error handling infrastructure

## Usage Example

```rust,no_run
use nis2_shield::crypto::CryptoService;
use nis2_shield::session::{ActivityKind, SessionGuardian};
use nis2_shield::storage::{MemoryStorage, SecureStorage};
use nis2_shield::Config;
use std::sync::Arc;

#[tokio::main]
async fn main() -> nis2_shield::AppResult<()> {
    let config = Config::load()?;

    let storage = SecureStorage::new(Arc::new(CryptoService::new()), Arc::new(MemoryStorage::new()));
    storage.set_value("draft", "unsent message").await?;

    let mut guardian = SessionGuardian::new(config.guardian_settings());
    guardian.on_transition(|event| println!("{:?}", event.transition));
    guardian.start()?;
    guardian.activity(ActivityKind::KeyDown);
    guardian.stop().await;
    Ok(())
}
```
*/

/// Command-line interface for the `shield` binary
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// Encryption under an ephemeral key
pub mod crypto;
/// Error types and utilities for error handling
pub mod errors;
/// Tracing subscriber setup
pub mod logging;
/// Idle/active session tracking
pub mod session;
/// Plain and encrypted key-value storage
pub mod storage;
/// Audit telemetry delivery
pub mod telemetry;

// Re-export important types for convenience
pub use config::Config;
pub use crypto::{CryptoService, EncryptedPayload};
pub use errors::{AppError, AppResult};
pub use session::{SessionGuardian, SessionState};
